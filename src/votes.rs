//! # Voting
//!
//! One vote per client per server per [`COOLDOWN_SECS`]. The ledger keeps only
//! the latest vote for each (client, server) pair; eligibility is computed
//! from that timestamp on every query, nothing ever expires entries.
//!
//! ```text
//! Eligible --cast--> CoolingDown --24h elapsed--> Eligible
//! ```

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::directory::Server;
use crate::error::AppError;
use crate::identity::ClientIdentifier;
use crate::lenient;
use crate::store::{Document, DocumentStore, RecordList, RecordMap};
use crate::validation;

pub const COOLDOWN_SECS: i64 = 24 * 60 * 60;

/// Latest vote by one client for one server. Persisted in `votes.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Seconds since the Unix epoch
    #[serde(deserialize_with = "lenient::integer")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "lenient::text")]
    pub username: String,
}

pub type VoteLedger = RecordMap<VoteRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatus {
    pub can_vote: bool,
    /// Seconds until the client may vote again
    pub time_remaining: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub message: String,
    pub new_vote_count: u64,
}

/// Vote submission as sent by the visitor. Field types are coerced the
/// same way as [`crate::directory::NewServer`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(deserialize_with = "lenient::text")]
    pub server_id: String,
    #[serde(deserialize_with = "lenient::text")]
    pub username: String,
}

fn ledger_key(client: &ClientIdentifier, server_id: &str) -> String {
    format!("{}_{}", client, server_id)
}

fn status_at(record: Option<&VoteRecord>, now: i64) -> VoteStatus {
    let Some(record) = record else {
        return VoteStatus {
            can_vote: true,
            time_remaining: 0,
        };
    };

    let elapsed = now - record.timestamp;
    let time_remaining = (COOLDOWN_SECS - elapsed).max(0);
    VoteStatus {
        can_vote: time_remaining == 0,
        time_remaining,
    }
}

/// `"5h 3m"` from an hour up, `"42 minutos"` below.
fn format_remaining(secs: i64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{} minutos", minutes)
    }
}

pub struct VoteService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl VoteService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn status(&self, client: &ClientIdentifier, server_id: &str) -> VoteStatus {
        let ledger = VoteLedger::load(self.store.as_ref(), Document::Votes);
        status_at(ledger.get(&ledger_key(client, server_id)), self.clock.now().timestamp())
    }

    /// Status for every listed server, keyed by server id.
    pub fn status_all(&self, client: &ClientIdentifier) -> BTreeMap<String, VoteStatus> {
        let servers = RecordList::<Server>::load(self.store.as_ref(), Document::Servers).into_records();
        let ledger = VoteLedger::load(self.store.as_ref(), Document::Votes);
        let now = self.clock.now().timestamp();

        servers
            .into_iter()
            .map(|server| {
                let status = status_at(ledger.get(&ledger_key(client, &server.id)), now);
                (server.id, status)
            })
            .collect()
    }

    /// Record a vote and bump the server's counters.
    ///
    /// # Returns
    /// - `Ok(VoteReceipt)`: thank-you message and the server's new `votes`
    /// - `Err(Validation)`: bad username
    /// - `Err(NotFound)`: no server with that id
    /// - `Err(RateLimited)`: voted for this server less than 24h ago
    pub fn cast(&self, client: &ClientIdentifier, request: VoteRequest) -> Result<VoteReceipt, AppError> {
        if !validation::is_valid_username(&request.username) {
            return Err(AppError::Validation(
                "Username inválido. Usa 3-16 caracteres (letras, números, _)".to_string(),
            ));
        }

        let mut servers_writer = self.store.lock(Document::Servers)?;
        let mut votes_writer = self.store.lock(Document::Votes)?;

        let mut servers = RecordList::<Server>::load(self.store.as_ref(), Document::Servers);
        if !servers.iter().any(|s| s.id == request.server_id) {
            return Err(AppError::NotFound("Servidor no encontrado.".to_string()));
        }

        let mut ledger = VoteLedger::load(self.store.as_ref(), Document::Votes);
        let key = ledger_key(client, &request.server_id);
        let now = self.clock.now().timestamp();

        let status = status_at(ledger.get(&key), now);
        if !status.can_vote {
            debug!(
                "⏳ Client {} still cooling down for '{}' ({}s left)",
                client, request.server_id, status.time_remaining
            );
            return Err(AppError::RateLimited(format!(
                "Ya votaste. Puedes volver a votar en {}",
                format_remaining(status.time_remaining)
            )));
        }

        ledger.insert(
            key,
            VoteRecord {
                timestamp: now,
                username: validation::strip_username(&request.username),
            },
        );
        if let Err(e) = ledger.save(&mut *votes_writer) {
            error!("❌ Failed to persist {}: {}", Document::Votes.file_name(), e);
        }

        let mut new_vote_count = 0;
        if let Some(server) = servers.iter_mut().find(|s| s.id == request.server_id) {
            server.votes += 1;
            server.votes_all_time += 1;
            new_vote_count = server.votes;
        }
        if let Err(e) = servers.save(&mut *servers_writer) {
            error!("❌ Failed to persist {}: {}", Document::Servers.file_name(), e);
        }

        info!("🗳️  Vote for '{}' recorded ({} votes)", request.server_id, new_vote_count);

        Ok(VoteReceipt {
            message: format!(
                "¡Gracias {}! Tu voto ha sido registrado.",
                validation::escape_html(request.username.trim())
            ),
            new_vote_count,
        })
    }
}
