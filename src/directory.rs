//! # Server Directory
//!
//! Owns the list of registered game servers.
//!
//! ## Operations
//!
//! - [`DirectoryService::list`]: every server, featured first, then by votes
//! - [`DirectoryService::register`]: validate, deduplicate and store a new
//!   listing, at most one per [`ClientIdentifier`]
//!
//! ## Registration checks (in order)
//!
//! 1. Registration guard: the client has not registered a server yet (429)
//! 2. Name: 3-32 chars of letters, digits, spaces, `-`, `_` (400)
//! 3. Address: IP literal or `host.tld[:port]` (400)
//! 4. Description: 20-300 chars, not counting markup (400)
//! 5. Tags: unknown ones are dropped, never rejected
//! 6. Uniqueness: address, then name, case-insensitive (409)

use log::{debug, error, info};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::AppError;
use crate::identity::ClientIdentifier;
use crate::lenient;
use crate::store::{Document, DocumentStore, RecordList, RecordMap};
use crate::validation::{self, Tag};

/// Registrations allowed per client identifier.
pub const MAX_SERVERS_PER_CLIENT: usize = 1;

/// Slug used when a name has no `[a-z0-9]` characters at all.
const FALLBACK_SLUG: &str = "server";

/// A listed game server as persisted in `servers.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub description: String,
    #[serde(default, deserialize_with = "known_tags")]
    pub tags: Vec<Tag>,
    #[serde(default, deserialize_with = "lenient::counter")]
    pub votes: u64,
    #[serde(default, deserialize_with = "lenient::counter")]
    pub votes_all_time: u64,
    /// Curated by operators by editing the file; no API sets it.
    #[serde(default)]
    pub featured: bool,
    /// Curated by operators by editing the file; no API sets it.
    #[serde(default)]
    pub verified: bool,
    /// Milliseconds since the Unix epoch
    #[serde(default, deserialize_with = "lenient::integer")]
    pub created_at: i64,
}

/// A server together with its position in the current listing.
#[derive(Debug, Clone, Serialize)]
pub struct RankedServer {
    #[serde(flatten)]
    pub server: Server,
    /// 1-based, computed per listing
    pub rank: usize,
}

/// Who registered what. Persisted in `user_servers.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationGuard {
    #[serde(default, deserialize_with = "lenient::text")]
    pub server_id: String,
    /// Seconds since the Unix epoch
    #[serde(default, deserialize_with = "lenient::integer")]
    pub timestamp: i64,
}

pub type RegistrationGuards = RecordMap<RegistrationGuard>;

/// Registration payload as submitted by the visitor.
///
/// Decoding never fails on field types: a non-string name reads as its
/// text form and a non-list `tags` as no tags. Whether the values are
/// acceptable is decided by [`DirectoryService::register`], after the
/// registration guard.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewServer {
    #[serde(deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(deserialize_with = "lenient::text")]
    pub ip: String,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::text_list")]
    pub tags: Vec<String>,
}

pub struct DirectoryService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl DirectoryService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Featured servers first, then by votes descending. Ties keep file order.
    pub fn list(&self) -> Vec<RankedServer> {
        let mut servers = RecordList::<Server>::load(self.store.as_ref(), Document::Servers).into_records();
        sort_for_listing(&mut servers);

        servers
            .into_iter()
            .enumerate()
            .map(|(i, server)| RankedServer { server, rank: i + 1 })
            .collect()
    }

    /// Validate and store a new listing on behalf of `client`.
    ///
    /// Both documents touched are locked for the whole read-modify-write, so
    /// concurrent registrations can't both pass the uniqueness checks.
    ///
    /// # Returns
    /// - `Ok(Server)`: the record exactly as stored
    /// - `Err`: the first failed check, see the module docs
    pub fn register(&self, client: &ClientIdentifier, request: NewServer) -> Result<Server, AppError> {
        let mut servers_writer = self.store.lock(Document::Servers)?;
        let mut guards_writer = self.store.lock(Document::Registrations)?;

        let mut guards = RegistrationGuards::load(self.store.as_ref(), Document::Registrations);
        if guards.contains_key(client.as_str()) {
            debug!("🚫 Client {} already registered a server", client);
            return Err(AppError::RateLimited(format!(
                "Ya has registrado un servidor. Solo se permite {} servidor por usuario.",
                MAX_SERVERS_PER_CLIENT
            )));
        }

        if !validation::is_valid_server_name(&request.name) {
            return Err(AppError::Validation(
                "Nombre inválido. Usa 3-32 caracteres alfanuméricos.".to_string(),
            ));
        }
        if !validation::is_valid_server_address(&request.ip) {
            return Err(AppError::Validation("IP o dominio inválido.".to_string()));
        }
        if !validation::is_valid_description(&request.description) {
            return Err(AppError::Validation(
                "La descripción debe tener entre 20 y 300 caracteres.".to_string(),
            ));
        }
        let tags = validation::filter_tags(&request.tags);

        let name = validation::sanitize(&request.name, validation::NAME_MAX);
        let ip = validation::sanitize(&request.ip, validation::ADDRESS_MAX);
        let description = validation::sanitize(&request.description, validation::DESCRIPTION_MAX);

        let mut servers = RecordList::<Server>::load(self.store.as_ref(), Document::Servers);

        let ip_lower = ip.to_lowercase();
        let name_lower = name.to_lowercase();
        if stored_field(&servers, |s| s.ip.as_str(), "ip").any(|v| v.to_lowercase() == ip_lower) {
            return Err(AppError::Conflict("Ya existe un servidor con esa IP.".to_string()));
        }
        if stored_field(&servers, |s| s.name.as_str(), "name").any(|v| v.to_lowercase() == name_lower) {
            return Err(AppError::Conflict("Ya existe un servidor con ese nombre.".to_string()));
        }

        let now = self.clock.now();
        let taken: Vec<&str> = stored_field(&servers, |s| s.id.as_str(), "id").collect();
        let server = Server {
            id: unique_slug(&request.name, &taken),
            name,
            ip,
            description,
            tags,
            votes: 0,
            votes_all_time: 0,
            featured: false,
            verified: false,
            created_at: now.timestamp_millis(),
        };

        servers.push(server.clone());
        if let Err(e) = servers.save(&mut *servers_writer) {
            error!("❌ Failed to persist {}: {}", Document::Servers.file_name(), e);
        }

        guards.insert(
            client.as_str().to_string(),
            RegistrationGuard {
                server_id: server.id.clone(),
                timestamp: now.timestamp(),
            },
        );
        if let Err(e) = guards.save(&mut *guards_writer) {
            error!("❌ Failed to persist {}: {}", Document::Registrations.file_name(), e);
        }

        info!("✅ Registered server '{}' ({})", server.id, server.ip);
        Ok(server)
    }
}

/// Hand-edited files may carry tags outside the vocabulary; drop them
/// instead of failing the whole record.
fn known_tags<'de, D>(deserializer: D) -> Result<Vec<Tag>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = lenient::text_list(deserializer)?;
    Ok(validation::filter_tags(&raw))
}

/// One text field across every stored record, including records that only
/// survive in raw form, so uniqueness holds against those too.
fn stored_field<'a>(
    servers: &'a RecordList<Server>,
    field: fn(&Server) -> &str,
    key: &'static str,
) -> impl Iterator<Item = &'a str> + 'a {
    servers
        .iter()
        .map(field)
        .chain(servers.unreadable().filter_map(move |raw| raw.get(key).and_then(Value::as_str)))
}

fn sort_for_listing(servers: &mut [Server]) {
    servers.sort_by(|a, b| b.featured.cmp(&a.featured).then(b.votes.cmp(&a.votes)));
}

/// Slug of `name`, suffixed `-1`, `-2`, ... until no taken id matches.
fn unique_slug(name: &str, taken: &[&str]) -> String {
    let mut base = validation::slugify(name);
    if base.is_empty() {
        base = FALLBACK_SLUG.to_string();
    }

    let mut candidate = base.clone();
    let mut counter = 1;
    while taken.contains(&candidate.as_str()) {
        candidate = format!("{}-{}", base, counter);
        counter += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use serde_json::json;

    const NOW: i64 = 1_767_225_600;

    fn service() -> (DirectoryService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at_timestamp(NOW));
        (DirectoryService::new(store.clone(), clock), store)
    }

    fn client(n: u8) -> ClientIdentifier {
        ClientIdentifier::from_address(&format!("10.0.0.{}", n), "salt")
    }

    fn request(name: &str, ip: &str) -> NewServer {
        NewServer {
            name: name.to_string(),
            ip: ip.to_string(),
            description: "A".repeat(25),
            tags: vec!["pvp".to_string()],
        }
    }

    fn server(id: &str, votes: u64, featured: bool) -> Server {
        Server {
            id: id.to_string(),
            name: id.to_string(),
            ip: format!("{}.example.com", id),
            description: "x".repeat(20),
            tags: Vec::new(),
            votes,
            votes_all_time: votes,
            featured,
            verified: false,
            created_at: 0,
        }
    }

    #[test]
    fn test_register_example_listing() {
        let (directory, _) = service();
        let stored = directory
            .register(
                &client(1),
                NewServer {
                    name: "Mi Server".to_string(),
                    ip: "play.test.com".to_string(),
                    description: "A".repeat(25),
                    tags: vec!["pvp".to_string(), "unknown-tag".to_string()],
                },
            )
            .unwrap();

        assert_eq!(stored.id, "mi-server");
        assert_eq!(stored.tags, vec![Tag::Pvp]);
        assert_eq!(stored.votes, 0);
        assert_eq!(stored.votes_all_time, 0);
        assert!(!stored.featured);
        assert!(!stored.verified);
        assert_eq!(stored.created_at, NOW * 1000);
    }

    #[test]
    fn test_register_then_list_round_trip() {
        let (directory, _) = service();
        let stored = directory.register(&client(1), request("Mi Server", "play.test.com")).unwrap();

        let listing = directory.list();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].server, stored);
        assert_eq!(listing[0].rank, 1);
    }

    #[test]
    fn test_colliding_slugs_get_numeric_suffix() {
        let (directory, store) = service();
        store
            .write(Document::Servers, &json!([server("test", 0, false)]))
            .unwrap();

        let second = directory.register(&client(1), request("Test_", "b.example.com")).unwrap();
        assert_eq!(second.id, "test-1");

        let third = directory.register(&client(2), request(" Test ", "c.example.com"));
        assert!(matches!(third, Err(AppError::Conflict(_))));

        let fourth = directory.register(&client(3), request("-test-", "d.example.com")).unwrap();
        assert_eq!(fourth.id, "test-2");
    }

    #[test]
    fn test_unique_slug_suffixes() {
        assert_eq!(unique_slug("Test", &[]), "test");
        assert_eq!(unique_slug("Test", &["test"]), "test-1");
        assert_eq!(unique_slug("Test", &["test", "test-1"]), "test-2");
        assert_eq!(unique_slug("Test", &["test-1"]), "test");
    }

    #[test]
    fn test_second_registration_from_same_client_is_rate_limited() {
        let (directory, _) = service();
        directory.register(&client(1), request("First One", "a.example.com")).unwrap();

        let valid = directory.register(&client(1), request("Second One", "b.example.com"));
        assert!(matches!(valid, Err(AppError::RateLimited(_))));

        let invalid = directory.register(&client(1), NewServer::default());
        assert!(matches!(invalid, Err(AppError::RateLimited(_))));
    }

    #[test]
    fn test_guard_records_server_id() {
        let (directory, memory) = service();
        directory.register(&client(1), request("First One", "a.example.com")).unwrap();

        let guards = RegistrationGuards::load(memory.as_ref(), Document::Registrations);
        assert_eq!(
            guards.get(client(1).as_str()),
            Some(&RegistrationGuard {
                server_id: "first-one".to_string(),
                timestamp: NOW,
            })
        );
    }

    #[test]
    fn test_rejected_registration_does_not_consume_quota() {
        let (directory, _) = service();
        let rejected = directory.register(&client(1), request("ab", "a.example.com"));
        assert!(matches!(rejected, Err(AppError::Validation(_))));

        assert!(directory.register(&client(1), request("abc", "a.example.com")).is_ok());
    }

    #[test]
    fn test_validation_order() {
        let (directory, _) = service();

        let mut bad_everything = request("x", "nope");
        bad_everything.description = "short".to_string();
        let err = directory.register(&client(1), bad_everything).unwrap_err();
        assert_eq!(err.to_string(), "Nombre inválido. Usa 3-32 caracteres alfanuméricos.");

        let mut bad_ip_and_description = request("Good Name", "nope");
        bad_ip_and_description.description = "short".to_string();
        let err = directory.register(&client(1), bad_ip_and_description).unwrap_err();
        assert_eq!(err.to_string(), "IP o dominio inválido.");

        let mut bad_description = request("Good Name", "play.test.com");
        bad_description.description = "short".to_string();
        let err = directory.register(&client(1), bad_description).unwrap_err();
        assert_eq!(err.to_string(), "La descripción debe tener entre 20 y 300 caracteres.");
    }

    #[test]
    fn test_duplicates_are_case_insensitive_ip_first() {
        let (directory, _) = service();
        directory.register(&client(1), request("Alpha", "Play.Test.com")).unwrap();

        let both = directory.register(&client(2), request("ALPHA", "play.test.COM")).unwrap_err();
        assert_eq!(both.to_string(), "Ya existe un servidor con esa IP.");

        let name_only = directory.register(&client(3), request("alpha", "other.test.com")).unwrap_err();
        assert_eq!(name_only.to_string(), "Ya existe un servidor con ese nombre.");
    }

    #[test]
    fn test_stored_text_is_escaped() {
        let (directory, _) = service();
        let mut req = request("Safe Name", "safe.example.com");
        req.description = "<script>alert(1)</script> \"quoted\" & more text".to_string();

        let stored = directory.register(&client(1), req).unwrap();
        assert_eq!(stored.description, "alert(1) &quot;quoted&quot; &amp; more text");
    }

    #[test]
    fn test_prose_angle_brackets_survive_registration() {
        let (directory, _) = service();
        let mut req = request("Tranquilo", "calma.example.com");
        req.description = "Para jugadores < 18 anos, survival tranquilo".to_string();

        let stored = directory.register(&client(1), req).unwrap();
        assert_eq!(stored.description, "Para jugadores &lt; 18 anos, survival tranquilo");
    }

    #[test]
    fn test_markup_does_not_count_towards_description_length() {
        let (directory, _) = service();
        let mut req = request("Padded", "padded.example.com");
        req.description = "<span class=\"x\">corto</span>".to_string();

        let err = directory.register(&client(1), req).unwrap_err();
        assert_eq!(err.to_string(), "La descripción debe tener entre 20 y 300 caracteres.");
    }

    fn mixed_servers_document() -> serde_json::Value {
        json!([
            {"id": "alpha", "name": "Alpha", "ip": "a.test.com",
             "description": "x".repeat(20), "votes": 10},
            {"id": "beta", "name": "Beta", "ip": "b.test.com",
             "description": "x".repeat(20), "votes": "3"},
            {"id": "broken", "name": 7, "ip": "c.test.com", "votes": {"bad": true}},
        ])
    }

    #[test]
    fn test_unreadable_server_record_does_not_hide_the_others() {
        let (directory, store) = service();
        store.write(Document::Servers, &mixed_servers_document()).unwrap();

        let listing = directory.list();
        let summary: Vec<(&str, u64)> = listing.iter().map(|r| (r.server.id.as_str(), r.server.votes)).collect();
        assert_eq!(summary, vec![("alpha", 10), ("beta", 3)]);
    }

    #[test]
    fn test_unreadable_server_record_still_blocks_duplicates() {
        let (directory, store) = service();
        store.write(Document::Servers, &mixed_servers_document()).unwrap();

        let alpha = directory.register(&client(1), request("Alpha", "a.test.com")).unwrap_err();
        assert!(matches!(alpha, AppError::Conflict(_)));

        let broken_ip = directory.register(&client(2), request("Other", "C.test.com")).unwrap_err();
        assert_eq!(broken_ip.to_string(), "Ya existe un servidor con esa IP.");

        let slug = directory.register(&client(3), request("Broken", "d.test.com")).unwrap();
        assert_eq!(slug.id, "broken-1");
    }

    #[test]
    fn test_unreadable_server_record_is_written_back_verbatim() {
        let (directory, store) = service();
        let original = mixed_servers_document();
        store.write(Document::Servers, &original).unwrap();

        directory.register(&client(1), request("Gamma", "g.test.com")).unwrap();

        let raw = store.read(Document::Servers);
        assert_eq!(raw.as_array().map(Vec::len), Some(4));
        assert_eq!(raw[2], original[2]);
        assert_eq!(raw[1]["votes"], json!(3));
        assert_eq!(raw[3]["id"], json!("gamma"));
    }

    #[test]
    fn test_unreadable_guard_entry_still_counts_as_registered() {
        let (directory, store) = service();
        store
            .write(Document::Registrations, &json!({client(1).as_str(): "corrupted"}))
            .unwrap();

        let err = directory.register(&client(1), request("Alpha", "a.test.com")).unwrap_err();
        assert!(matches!(err, AppError::RateLimited(_)));

        directory.register(&client(2), request("Alpha", "a.test.com")).unwrap();
        let raw = store.read(Document::Registrations);
        assert_eq!(raw[client(1).as_str()], json!("corrupted"));
        assert_eq!(raw[client(2).as_str()]["serverId"], json!("alpha"));
    }

    #[test]
    fn test_listing_order_featured_then_votes() {
        let (directory, store) = service();
        store
            .write(
                Document::Servers,
                &json!([
                    server("low", 1, false),
                    server("featured-low", 0, true),
                    server("high", 50, false),
                    server("tie-a", 10, false),
                    server("featured-high", 5, true),
                    server("tie-b", 10, false),
                ]),
            )
            .unwrap();

        let listing = directory.list();
        let ids: Vec<&str> = listing.iter().map(|r| r.server.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["featured-high", "featured-low", "high", "tie-a", "tie-b", "low"]
        );
        let ranks: Vec<usize> = listing.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_stored_records_missing_counters_default_to_zero() {
        let (directory, store) = service();
        store
            .write(
                Document::Servers,
                &json!([{"id": "old", "name": "Old", "ip": "old.example.com", "description": "legacy"}]),
            )
            .unwrap();

        let listing = directory.list();
        assert_eq!(listing[0].server.votes, 0);
        assert!(!listing[0].server.featured);
    }

    #[test]
    fn test_unknown_stored_tags_are_dropped_not_fatal() {
        let (directory, store) = service();
        store
            .write(
                Document::Servers,
                &json!([{"id": "old", "name": "Old", "ip": "old.example.com",
                         "description": "legacy", "tags": ["pvp", "hardcore"]}]),
            )
            .unwrap();

        let listing = directory.list();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].server.tags, vec![Tag::Pvp]);
    }

    #[test]
    fn test_rank_is_not_persisted() {
        let (directory, store) = service();
        directory.register(&client(1), request("Mi Server", "play.test.com")).unwrap();
        directory.list();

        let raw = store.read(Document::Servers);
        assert!(raw[0].get("rank").is_none());
        assert_eq!(raw[0]["votesAllTime"], json!(0));
        assert_eq!(raw[0]["createdAt"], json!(NOW * 1000));
    }

    #[test]
    fn test_name_without_slug_characters_uses_fallback() {
        let (directory, _) = service();
        let stored = directory.register(&client(1), request("___", "a.example.com")).unwrap();
        assert_eq!(stored.id, "server");
    }
}
