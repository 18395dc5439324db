use tracing::debug;

use super::decoder::decode;
use super::error::{MalformedDescriptor, ResolveError};

/// Byte offset of the priority digit, which also starts the encoded path.
const PRIORITY_OFFSET: usize = 2;

/// A validated source descriptor from the episode API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    raw: String,
    priority: u8,
}

impl SourceDescriptor {
    pub fn parse(raw: &str) -> Result<Self, MalformedDescriptor> {
        match raw.as_bytes().get(PRIORITY_OFFSET) {
            Some(byte) if byte.is_ascii_digit() => Ok(Self {
                raw: raw.to_string(),
                priority: byte - b'0',
            }),
            _ => Err(MalformedDescriptor {
                raw: raw.to_string(),
            }),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Obfuscated path, starting at the priority digit.
    pub fn encoded_path(&self) -> &str {
        // The byte at PRIORITY_OFFSET is ASCII, so this is a char boundary.
        &self.raw[PRIORITY_OFFSET..]
    }

    pub fn decoded_path(&self) -> String {
        decode(self.encoded_path())
    }
}

/// Chooses which descriptors are worth fetching.
///
/// Malformed descriptors are dropped. When any descriptor decodes to a path
/// on the `dominant` provider, the one with the highest priority digit is
/// fetched alone; otherwise every valid descriptor is kept in order.
pub fn select_candidates<S: AsRef<str>>(
    raw: &[S],
    dominant: Option<&str>,
) -> Result<Vec<SourceDescriptor>, ResolveError> {
    let mut valid = Vec::with_capacity(raw.len());
    let mut best_dominant: Option<SourceDescriptor> = None;

    for entry in raw {
        let descriptor = match SourceDescriptor::parse(entry.as_ref()) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                debug!(%err, "dropping source descriptor");
                continue;
            }
        };

        let on_dominant = dominant.is_some_and(|domain| descriptor.decoded_path().contains(domain));
        if on_dominant {
            if best_dominant
                .as_ref()
                .is_none_or(|best| descriptor.priority() > best.priority())
            {
                best_dominant = Some(descriptor);
            }
        } else {
            valid.push(descriptor);
        }
    }

    if let Some(descriptor) = best_dominant {
        debug!(
            descriptor = descriptor.raw(),
            priority = descriptor.priority(),
            "dominant provider descriptor found, skipping the rest"
        );
        return Ok(vec![descriptor]);
    }

    if valid.is_empty() {
        return Err(ResolveError::NoCandidates);
    }
    Ok(valid)
}
