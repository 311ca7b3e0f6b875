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

//! The Postgres-backed production storage.
//!
//! Expected schema (managed by the deployment, not by this crate):
//!
//! ```sql
//! CREATE TYPE offer_state AS ENUM
//!     ('pending', 'interested', 'declined', 'expired', 'closed');
//! CREATE TABLE cases (
//!     id text PRIMARY KEY,
//!     client_id text NOT NULL
//! );
//! CREATE TABLE lawyers (
//!     id text PRIMARY KEY,
//!     last_offered_at timestamptz
//! );
//! CREATE TABLE offers (
//!     id uuid PRIMARY KEY,
//!     case_id text NOT NULL,
//!     lawyer_id text NOT NULL,
//!     state offer_state NOT NULL,
//!     breakdown jsonb NOT NULL,
//!     fair_score real NOT NULL,
//!     sent_at timestamptz NOT NULL,
//!     responded_at timestamptz,
//!     expires_at timestamptz NOT NULL,
//!     UNIQUE (case_id, lawyer_id)
//! );
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize, Serializer};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    types::Json,
    FromRow,
    Pool,
    Postgres,
};

use jurimatch_scoring::{Case, CaseId, ClientId, LawyerId, MatchBreakdown};

use crate::{
    audit::{AuditRecord, AuditSink, FeedbackLabel},
    error::{PersistenceError, SetupError},
    offers::{NewOffer, Offer, OfferId, OfferState},
    storage::{feedback_for, OfferStorage},
};

fn serialize_redacted<S>(_secret: &Secret<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str("[redacted]")
}

/// Configuration for the connection to postgres.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// The default base url.
    ///
    /// Passwords in the url are ignored, set the password separately.
    base_url: String,

    /// Override port from base url.
    port: Option<u16>,

    /// Override user from base url.
    user: Option<String>,

    /// Sets the password.
    #[serde(serialize_with = "serialize_redacted")]
    password: Secret<String>,

    /// Override db from base url.
    db: Option<String>,

    /// Override default application name from base url.
    application_name: Option<String>,

    /// The maximum number of pooled connections.
    max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "postgres://user:pw@localhost:5432/jurimatch".into(),
            port: None,
            user: None,
            password: String::from("pw").into(),
            db: None,
            application_name: None,
            max_connections: 25,
        }
    }
}

impl Config {
    fn to_connection_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        let Self {
            base_url,
            port,
            user,
            password,
            db,
            application_name,
            max_connections: _,
        } = self;

        let mut options = base_url
            .parse::<PgConnectOptions>()?
            .password(password.expose_secret());

        if let Some(user) = user {
            options = options.username(user);
        }
        if let Some(port) = port {
            options = options.port(*port);
        }
        if let Some(db) = db {
            options = options.database(db);
        }
        if let Some(application_name) = application_name {
            options = options.application_name(application_name);
        }

        Ok(options)
    }

    pub(crate) async fn setup_database(&self) -> Result<Database, SetupError> {
        let options = self.to_connection_options()?;
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await?;

        Ok(Database { pool })
    }
}

pub struct Database {
    pool: Pool<Postgres>,
}

#[derive(FromRow)]
struct OfferRow {
    id: OfferId,
    case_id: CaseId,
    lawyer_id: LawyerId,
    state: OfferState,
    breakdown: Json<MatchBreakdown>,
    sent_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
}

impl From<OfferRow> for Offer {
    fn from(row: OfferRow) -> Self {
        Self {
            id: row.id,
            case_id: row.case_id,
            lawyer_id: row.lawyer_id,
            state: row.state,
            breakdown: row.breakdown.0,
            sent_at: row.sent_at,
            responded_at: row.responded_at,
            expires_at: row.expires_at,
        }
    }
}

const OFFER_COLUMNS: &str =
    "id, case_id, lawyer_id, state, breakdown, sent_at, responded_at, expires_at";

#[async_trait]
impl OfferStorage for Database {
    async fn persist_ranking(
        &self,
        case: &Case,
        offers: Vec<NewOffer>,
        records: Vec<AuditRecord>,
        audit: &dyn AuditSink,
    ) -> Result<Vec<OfferId>, PersistenceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO cases (id, client_id) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET client_id = EXCLUDED.client_id;",
        )
        .bind(&case.id)
        .bind(&case.client_id)
        .execute(&mut tx)
        .await?;

        let mut ids = Vec::with_capacity(offers.len());
        for offer in offers {
            let id = sqlx::query_scalar::<_, OfferId>(
                "INSERT INTO offers
                     (id, case_id, lawyer_id, state, breakdown, fair_score,
                      sent_at, responded_at, expires_at)
                 VALUES ($1, $2, $3, 'pending', $4, $5, $6, NULL, $7)
                 ON CONFLICT (case_id, lawyer_id) DO UPDATE SET
                     state = 'pending',
                     breakdown = EXCLUDED.breakdown,
                     fair_score = EXCLUDED.fair_score,
                     sent_at = EXCLUDED.sent_at,
                     responded_at = NULL,
                     expires_at = EXCLUDED.expires_at
                 RETURNING id;",
            )
            .bind(OfferId::new())
            .bind(&offer.case_id)
            .bind(&offer.lawyer_id)
            .bind(Json(&offer.breakdown))
            .bind(offer.breakdown.fair)
            .bind(offer.sent_at)
            .bind(offer.expires_at)
            .fetch_one(&mut tx)
            .await?;

            sqlx::query(
                "INSERT INTO lawyers (id, last_offered_at) VALUES ($1, $2)
                 ON CONFLICT (id) DO UPDATE SET last_offered_at = EXCLUDED.last_offered_at;",
            )
            .bind(&offer.lawyer_id)
            .bind(offer.sent_at)
            .execute(&mut tx)
            .await?;

            ids.push(id);
        }

        // the offers only become durable if their audit records do as well
        audit.append(&records).await?;
        tx.commit().await?;

        Ok(ids)
    }

    async fn get_offer(&self, id: &OfferId) -> Result<Option<Offer>, PersistenceError> {
        let offer = sqlx::query_as::<_, OfferRow>(&format!(
            "SELECT {OFFER_COLUMNS} FROM offers WHERE id = $1;",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(offer.map(Into::into))
    }

    #[allow(clippy::too_many_arguments)]
    async fn transition_offer(
        &self,
        id: &OfferId,
        from: &[OfferState],
        to: OfferState,
        responded_at: Option<DateTime<Utc>>,
        label: FeedbackLabel,
        now: DateTime<Utc>,
        audit: &dyn AuditSink,
    ) -> Result<Option<Offer>, PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, OfferRow>(&format!(
            "UPDATE offers
             SET state = $2, responded_at = COALESCE($3, responded_at)
             WHERE id = $1 AND state = ANY($4)
             RETURNING {OFFER_COLUMNS};",
        ))
        .bind(id)
        .bind(to)
        .bind(responded_at)
        .bind(from)
        .fetch_optional(&mut tx)
        .await?;

        let Some(updated) = updated else {
            return Ok(None);
        };
        let updated = Offer::from(updated);

        audit.append(&[feedback_for(&updated, label, now)]).await?;
        tx.commit().await?;

        Ok(Some(updated))
    }

    async fn close_siblings(
        &self,
        case_id: &CaseId,
        keep: &OfferId,
        now: DateTime<Utc>,
        audit: &dyn AuditSink,
    ) -> Result<u32, PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query_as::<_, OfferRow>(&format!(
            "UPDATE offers
             SET state = 'closed'
             WHERE case_id = $1 AND id != $2 AND state IN ('pending', 'interested')
             RETURNING {OFFER_COLUMNS};",
        ))
        .bind(case_id)
        .bind(keep)
        .fetch_all(&mut tx)
        .await?;

        let records = closed
            .into_iter()
            .map(Offer::from)
            .sorted_unstable_by(|o1, o2| o1.lawyer_id.cmp(&o2.lawyer_id))
            .map(|offer| feedback_for(&offer, FeedbackLabel::Lost, now))
            .collect_vec();

        audit.append(&records).await?;
        tx.commit().await?;

        #[allow(clippy::cast_possible_truncation)]
        Ok(records.len() as u32)
    }

    async fn expire_due(
        &self,
        now: DateTime<Utc>,
        audit: &dyn AuditSink,
    ) -> Result<u32, PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let expired = sqlx::query_as::<_, OfferRow>(&format!(
            "UPDATE offers
             SET state = 'expired'
             WHERE state = 'pending' AND expires_at <= $1
             RETURNING {OFFER_COLUMNS};",
        ))
        .bind(now)
        .fetch_all(&mut tx)
        .await?;

        let records = expired
            .into_iter()
            .map(Offer::from)
            .sorted_unstable_by(|o1, o2| o1.lawyer_id.cmp(&o2.lawyer_id))
            .map(|offer| feedback_for(&offer, FeedbackLabel::Expired, now))
            .collect_vec();

        audit.append(&records).await?;
        tx.commit().await?;

        #[allow(clippy::cast_possible_truncation)]
        Ok(records.len() as u32)
    }

    async fn offers_for_case(&self, case_id: &CaseId) -> Result<Vec<Offer>, PersistenceError> {
        let offers = sqlx::query_as::<_, OfferRow>(&format!(
            "SELECT {OFFER_COLUMNS} FROM offers
             WHERE case_id = $1
             ORDER BY fair_score DESC, lawyer_id ASC;",
        ))
        .bind(case_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(offers.into_iter().map(Into::into).collect())
    }

    async fn offers_for_lawyer(
        &self,
        lawyer_id: &LawyerId,
        state: Option<OfferState>,
    ) -> Result<Vec<Offer>, PersistenceError> {
        let offers = sqlx::query_as::<_, OfferRow>(&format!(
            "SELECT {OFFER_COLUMNS} FROM offers
             WHERE lawyer_id = $1 AND ($2::offer_state IS NULL OR state = $2)
             ORDER BY sent_at DESC, case_id ASC;",
        ))
        .bind(lawyer_id)
        .bind(state)
        .fetch_all(&self.pool)
        .await?;

        Ok(offers.into_iter().map(Into::into).collect())
    }

    async fn case_owner(&self, case_id: &CaseId) -> Result<Option<ClientId>, PersistenceError> {
        let owner = sqlx::query_scalar::<_, ClientId>(
            "SELECT client_id FROM cases WHERE id = $1;",
        )
        .bind(case_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(owner)
    }
}
