//! Message tables for English, Portuguese and Spanish screens.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entities::StatusKind;
use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Pt,
    Es,
}

impl Default for Locale {
    fn default() -> Self {
        Self::En
    }
}

impl Locale {
    pub const ALL: [Locale; 3] = [Locale::En, Locale::Pt, Locale::Es];

    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Pt => "pt",
            Self::Es => "es",
        }
    }

    /// Native name for a language picker.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Pt => "Português",
            Self::Es => "Español",
        }
    }

    /// Maps a language tag such as `pt-BR`; anything unknown is English.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().to_ascii_lowercase();

        Self::ALL
            .into_iter()
            .find(|locale| tag.starts_with(locale.code()))
            .unwrap_or_default()
    }
}

type Table = HashMap<String, String>;

pub struct Translator {
    tables: HashMap<Locale, Table>,
}

impl Translator {
    pub fn new() -> Result<Self, Error> {
        let sources = [
            (Locale::En, include_str!("../../locales/en.json")),
            (Locale::Pt, include_str!("../../locales/pt.json")),
            (Locale::Es, include_str!("../../locales/es.json")),
        ];

        let mut tables = HashMap::new();
        for (locale, source) in sources {
            let table: Table = serde_json::from_str(source).map_err(|err| {
                tracing::error!(locale = locale.code(), "bad message table: {:?}", err);
                Error::unexpected_error()
            })?;
            tables.insert(locale, table);
        }

        Ok(Self { tables })
    }

    fn lookup(&self, locale: Locale, key: &str) -> Option<&str> {
        self.tables
            .get(&locale)
            .and_then(|table| table.get(key))
            .map(String::as_str)
    }

    /// Falls back to English, then to the key itself. `{{name}}`
    /// placeholders without a matching param are left as written.
    pub fn translate(&self, locale: Locale, key: &str, params: &[(&str, &str)]) -> String {
        let template = self
            .lookup(locale, key)
            .or_else(|| self.lookup(Locale::En, key))
            .unwrap_or(key);

        substitute(template, params)
    }

    pub fn format_price(&self, locale: Locale, amount: f64) -> String {
        let amount = format!("{:.2}", amount);

        self.translate(locale, "priceFormat", &[("amount", &amount)])
    }

    pub fn status_label(&self, locale: Locale, status: StatusKind) -> String {
        let key = match status {
            StatusKind::Pending => "statusPending",
            StatusKind::Accepted => "statusAccepted",
            StatusKind::OnMission => "statusOnMission",
            StatusKind::Completed => "statusCompleted",
            StatusKind::Cancelled => "statusCancelled",
        };

        self.translate(locale, key, &[])
    }

    /// Text a screen shows for a failed call; server details pass through.
    pub fn describe_error(&self, locale: Locale, err: &Error) -> String {
        match err.is_network_error() {
            true => self.translate(locale, "networkError", &[]),
            false => err.message.clone(),
        }
    }
}

fn substitute(template: &str, params: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let end = match after.find("}}") {
            Some(end) => end,
            None => break,
        };

        let name = &after[..end];
        let value = params
            .iter()
            .find(|(param, _)| *param == name)
            .map(|(_, value)| *value);

        out.push_str(&rest[..start]);
        match value {
            Some(value) if is_word(name) => out.push_str(value),
            _ => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

fn is_word(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[test]
fn lookup_falls_back_to_english_then_the_key() {
    let translator = Translator::new().unwrap();

    assert_eq!(translator.translate(Locale::Pt, "statusPending", &[]), "Pendente");
    assert_eq!(translator.translate(Locale::Es, "statusPending", &[]), "Pendiente");
    assert_eq!(translator.translate(Locale::En, "statusPending", &[]), "Pending");
    assert_eq!(translator.translate(Locale::Es, "missingKey", &[]), "missingKey");

    let mut translator = translator;
    if let Some(table) = translator.tables.get_mut(&Locale::Pt) {
        table.remove("login");
    }
    assert_eq!(translator.translate(Locale::Pt, "login", &[]), "Login");
}

#[test]
fn params_substitute_and_unknown_placeholders_stay() {
    assert_eq!(substitute("{{a}} and {{b}}", &[("a", "1")]), "1 and {{b}}");
    assert_eq!(substitute("no params", &[("a", "1")]), "no params");
    assert_eq!(substitute("open {{a", &[("a", "1")]), "open {{a");

    let translator = Translator::new().unwrap();
    assert_eq!(translator.format_price(Locale::En, 450.0), "$450.00");
    assert_eq!(translator.format_price(Locale::Pt, 12.5), "$12.50");
    assert_eq!(
        translator.translate(Locale::En, "distanceAway", &[("distance", "3.2")]),
        "3.2 km away"
    );
}

#[test]
fn language_tags_and_error_text() {
    assert_eq!(Locale::from_tag("pt-BR"), Locale::Pt);
    assert_eq!(Locale::from_tag("ES"), Locale::Es);
    assert_eq!(Locale::from_tag("fr-FR"), Locale::En);

    let translator = Translator::new().unwrap();
    let err = Error::network_error("connection reset");
    assert_eq!(
        translator.describe_error(Locale::Es, &err),
        "Fallo de red, inténtelo de nuevo"
    );

    let err = Error::invalid_state_error("Request is not pending");
    assert_eq!(translator.describe_error(Locale::Pt, &err), "Request is not pending");
    assert_eq!(
        translator.status_label(Locale::Pt, StatusKind::OnMission),
        translator.translate(Locale::Pt, "statusOnMission", &[])
    );
}
