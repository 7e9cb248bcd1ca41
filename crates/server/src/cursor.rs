use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Opaque pagination cursor: base64 of `"<ISO time>,<id>"`. The tuple
/// matches the `(time DESC, id DESC)` query ordering; the next page is
/// every row strictly below the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub time: DateTime<Utc>,
    pub id: Uuid,
}

impl Cursor {
    pub fn new(time: DateTime<Utc>, id: Uuid) -> Self {
        Self { time, id }
    }

    pub fn encode(&self) -> String {
        let raw = format!(
            "{},{}",
            self.time.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.id
        );
        BASE64.encode(raw)
    }

    /// Decode an incoming cursor. Returns None on any malformation; the
    /// caller warns and ignores the cursor rather than failing the query.
    pub fn decode(raw: &str) -> Option<Self> {
        let bytes = BASE64.decode(raw).ok()?;
        let text = String::from_utf8(bytes).ok()?;
        let (time_part, id_part) = text.split_once(',')?;
        let time = DateTime::parse_from_rfc3339(time_part).ok()?.with_timezone(&Utc);
        let id = Uuid::parse_str(id_part).ok()?;
        Some(Self { time, id })
    }
}
