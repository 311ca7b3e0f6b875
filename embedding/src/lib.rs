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

//! Dense embedding vectors for case summaries and historical cases.
//!
//! Embeddings are produced by an external triage pipeline and consumed here as
//! precomputed, L2-normalized vectors. Case and history embeddings must agree
//! on their dimension, which the engine checks at the rank entry point.

mod embedding;

pub use crate::embedding::{
    Embedding,
    Embedding1,
    InvalidEmbedding,
    NormalizedEmbedding,
    COSINE_SIMILARITY_RANGE,
};
