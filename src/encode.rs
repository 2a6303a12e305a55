use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

// Characters that encodeURIComponent leaves bare; the SoundCloud connect
// page expects its query encoded with exactly this set.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A single connect-parameter or window-feature value. Empty strings, zero,
/// and `false` count as unset and are dropped by the encoders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Text(String),
    Number(i64),
    Flag(bool),
}

impl Field {
    pub fn text(value: impl Into<String>) -> Field {
        Field::Text(value.into())
    }

    fn is_set(&self) -> bool {
        match self {
            Field::Text(s) => !s.is_empty(),
            Field::Number(n) => *n != 0,
            Field::Flag(b) => *b,
        }
    }

    fn render(&self) -> String {
        match self {
            Field::Text(s) => s.clone(),
            Field::Number(n) => n.to_string(),
            Field::Flag(b) => b.to_string(),
        }
    }
}

/// Encode `pairs` as a URL query string: unset fields dropped, values
/// percent-encoded, entries joined with `&`. Order follows the slice.
pub fn to_params(pairs: &[(&str, Field)]) -> String {
    pairs
        .iter()
        .filter(|(_, value)| value.is_set())
        .map(|(key, value)| format!("{}={}", key, utf8_percent_encode(&value.render(), COMPONENT)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Encode `pairs` as a window-feature string: same filtering as
/// [`to_params`] but unencoded values joined with `,`.
pub fn to_options(pairs: &[(&str, Field)]) -> String {
    pairs
        .iter()
        .filter(|(_, value)| value.is_set())
        .map(|(key, value)| format!("{}={}", key, value.render()))
        .collect::<Vec<_>>()
        .join(",")
}
