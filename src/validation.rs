//! Input rules for server listings and voter names, plus the text scrubbing
//! applied to anything that gets stored.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::OnceLock;

pub const NAME_MIN: usize = 3;
pub const NAME_MAX: usize = 32;
pub const DESCRIPTION_MIN: usize = 20;
pub const DESCRIPTION_MAX: usize = 300;
pub const ADDRESS_MAX: usize = 64;
pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 16;

fn server_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9áéíóúÁÉÍÓÚñÑ\s\-_]+$").expect("server name pattern compiles")
    })
}

fn domain_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9\-.]+\.[a-zA-Z]{2,}(:\d{1,5})?$")
            .expect("domain pattern compiles")
    })
}

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("username pattern compiles"))
}

/// A closed tag, comment or declaration. A `<` followed by anything else
/// (`< 18`, `<3`) is prose and is left for [`escape_html`].
fn markup_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[A-Za-z/!?][^>]*>").expect("markup pattern compiles"))
}

fn char_len_within(value: &str, min: usize, max: usize) -> bool {
    let len = value.chars().count();
    (min..=max).contains(&len)
}

pub fn is_valid_server_name(name: &str) -> bool {
    let name = name.trim();
    char_len_within(name, NAME_MIN, NAME_MAX) && server_name_pattern().is_match(name)
}

/// IP literal, IP literal with port, or `host.tld[:port]`.
pub fn is_valid_server_address(address: &str) -> bool {
    let address = address.trim();
    address.parse::<IpAddr>().is_ok()
        || address.parse::<SocketAddr>().is_ok()
        || domain_pattern().is_match(address)
}

/// Measured after markup is stripped, so the stored text can't end up
/// shorter than the minimum.
pub fn is_valid_description(description: &str) -> bool {
    char_len_within(strip_markup(description).trim(), DESCRIPTION_MIN, DESCRIPTION_MAX)
}

pub fn is_valid_username(username: &str) -> bool {
    let username = username.trim();
    char_len_within(username, USERNAME_MIN, USERNAME_MAX) && username_pattern().is_match(username)
}

/// Drop everything outside `[A-Za-z0-9_]`.
pub fn strip_username(username: &str) -> String {
    username
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn strip_markup(input: &str) -> String {
    markup_pattern().replace_all(input, "").into_owned()
}

/// Strip tags, trim, escape, then cap at `max_chars`.
pub fn sanitize(input: &str, max_chars: usize) -> String {
    escape_html(strip_markup(input).trim()).chars().take(max_chars).collect()
}

/// Lowercase, collapse every run of non-`[a-z0-9]` into one `-`, trim `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Server categories a listing may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Survival,
    Pvp,
    Creativo,
    Minijuegos,
    Roleplay,
    #[serde(rename = "español")]
    Espanol,
}

impl Tag {
    pub fn parse(raw: &str) -> Option<Tag> {
        match raw {
            "survival" => Some(Tag::Survival),
            "pvp" => Some(Tag::Pvp),
            "creativo" => Some(Tag::Creativo),
            "minijuegos" => Some(Tag::Minijuegos),
            "roleplay" => Some(Tag::Roleplay),
            "español" => Some(Tag::Espanol),
            _ => None,
        }
    }
}

/// Keep recognized tags in first-seen order; drop unknowns and repeats.
pub fn filter_tags(raw: &[String]) -> Vec<Tag> {
    let mut tags = Vec::new();
    for tag in raw.iter().filter_map(|t| Tag::parse(t)) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}
