// Copyright 2024 Jurimatch AG
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

// not every test binary exercises every helper
#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use chrono::{TimeZone, Utc};

use jurimatch_engine::{
    audit::MemorySink,
    cache::memory::Cache,
    storage::memory::Storage,
    Config,
    Engine,
};
use jurimatch_scoring::{
    Case,
    CaseId,
    ClientId,
    Complexity,
    Curriculum,
    DegreeLevel,
    GeoPoint,
    Kpi,
    Lawyer,
    LawyerId,
    PostDegree,
    SuccessStatus,
};

pub struct TestEngine {
    pub engine: Engine,
    pub storage: Arc<Storage>,
    pub audit: Arc<MemorySink>,
}

pub fn engine() -> TestEngine {
    engine_with(Config::default())
}

pub fn engine_with(config: Config) -> TestEngine {
    let storage = Arc::new(Storage::default());
    let audit = Arc::new(MemorySink::default());
    let cache = Cache::new(config.cache.ttl);
    let engine = Engine::with_components(
        &config,
        Box::new(cache),
        Box::new(storage.clone()),
        Box::new(audit.clone()),
    );

    TestEngine {
        engine,
        storage,
        audit,
    }
}

pub fn case(id: &str) -> Case {
    Case {
        id: CaseId::from(id),
        client_id: ClientId::from("client_1"),
        area: "Trabalhista".into(),
        subarea: "Rescisao".into(),
        urgency_h: 48,
        coords: GeoPoint::new(-23.5505, -46.6333),
        complexity: Complexity::Medium,
        summary_embedding: [1., 0., 0.].try_into().unwrap(),
    }
}

pub fn lawyer(id: &str) -> Lawyer {
    Lawyer {
        id: LawyerId::from(id),
        tags_expertise: ["Trabalhista".to_string()].into(),
        geo_latlon: GeoPoint::new(-23.5505, -46.6333),
        curriculum: Curriculum {
            years_experience: 15,
            post_degrees: vec![PostDegree {
                level: DegreeLevel::Mestrado,
                area: "Direito Trabalhista".into(),
            }],
            publication_count: 3,
        },
        kpi: Kpi {
            success_rate: 0.9,
            cases_30d: 10,
            monthly_capacity: 30,
            avg_rating: 4.5,
            response_time_h: 12,
            cv_score: 0.8,
            success_status: SuccessStatus::V,
        },
        kpi_subarea: HashMap::new(),
        kpi_softskill: 0.7,
        case_outcomes: vec![true],
        historical_embeddings: vec![[1., 0., 0.].try_into().unwrap()],
        review_texts: vec!["Profissional dedicado que resolveu meu caso com agilidade".into()],
        diversity: None,
        last_offered_at: Utc.timestamp_opt(1_000, 0).unwrap(),
    }
}

/// A lawyer hitting close to the maximum of every feature.
pub fn perfect_lawyer(id: &str) -> Lawyer {
    let mut lawyer = lawyer(id);
    lawyer.curriculum = Curriculum {
        years_experience: 25,
        post_degrees: vec![
            PostDegree {
                level: DegreeLevel::Doutorado,
                area: "Direito Trabalhista".into(),
            },
            PostDegree {
                level: DegreeLevel::Doutorado,
                area: "Direito Trabalhista".into(),
            },
        ],
        publication_count: 10,
    };
    lawyer.kpi = Kpi {
        success_rate: 0.95,
        cases_30d: 5,
        monthly_capacity: 30,
        avg_rating: 5.,
        response_time_h: 1,
        cv_score: 1.,
        success_status: SuccessStatus::V,
    };
    lawyer.kpi_softskill = 1.;
    lawyer.review_texts = vec![
        "Advogado extremamente competente e atencioso".into(),
        "Resolveu a rescisao em tempo recorde para mim".into(),
        "Comunicacao clara durante todo o processo judicial".into(),
        "Sempre disponivel para esclarecer minhas duvidas".into(),
        "Recomendo fortemente este profissional excelente".into(),
    ];

    lawyer
}
