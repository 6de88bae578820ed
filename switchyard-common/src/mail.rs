//! A message travelling through the processing pipeline
//!
//! A [`Mail`] couples the SMTP [`Envelope`] with the raw message bytes, the
//! [`ProcessingState`] it should next be handled in, free-form attributes
//! stages use to pass information along, and any DSN parameters.
//!
//! Mails are deliberately not `Clone`. A copy that should travel on its own
//! is made with [`Mail::duplicate`], which gives it a fresh [`MailName`], and
//! is handed over by value so that whoever owns it last releases it.

use std::{borrow::Cow, fmt, str::FromStr, sync::Arc};

use ahash::AHashMap;
use mailparse::MailHeaderMap;
use serde::{Deserialize, Serialize};

use crate::{Address, Envelope, dsn::DsnParameters, error::MailError};

/// Unique identifier for a mail
///
/// ULIDs sort by creation time, so duplicates always sort after the mail
/// they were copied from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MailName {
    id: ulid::Ulid,
}

impl MailName {
    #[must_use]
    pub fn generate() -> Self {
        Self {
            id: ulid::Ulid::new(),
        }
    }
}

impl fmt::Display for MailName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl FromStr for MailName {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            id: ulid::Ulid::from_string(s)?,
        })
    }
}

impl Serialize for MailName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MailName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Name of the pipeline state a mail is to be processed in next
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ProcessingState(Cow<'static, str>);

impl ProcessingState {
    /// Freshly received mail
    pub const ROOT: Self = Self(Cow::Borrowed("root"));
    /// Mail ready to leave for remote delivery
    pub const TRANSPORT: Self = Self(Cow::Borrowed("transport"));
    /// Mail that could not be handled and should bounce
    pub const ERROR: Self = Self(Cow::Borrowed("error"));
    /// Mail that has been fully consumed and must not be delivered further
    pub const GHOST: Self = Self(Cow::Borrowed("ghost"));

    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self::ROOT
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ProcessingState {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl From<&'static str> for ProcessingState {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<ProcessingState> for String {
    fn from(value: ProcessingState) -> Self {
        value.0.into_owned()
    }
}

#[derive(Debug)]
pub struct Mail {
    name: MailName,
    envelope: Envelope,
    data: Arc<[u8]>,
    state: ProcessingState,
    attributes: AHashMap<String, String>,
    dsn: Option<DsnParameters>,
}

impl Mail {
    #[must_use]
    pub fn new(envelope: Envelope, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: MailName::generate(),
            envelope,
            data: data.into(),
            state: ProcessingState::ROOT,
            attributes: AHashMap::new(),
            dsn: None,
        }
    }

    /// Copy this mail under a new name
    ///
    /// The message body is shared, everything else is copied.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            name: MailName::generate(),
            envelope: self.envelope.clone(),
            data: Arc::clone(&self.data),
            state: self.state.clone(),
            attributes: self.attributes.clone(),
            dsn: self.dsn.clone(),
        }
    }

    #[inline]
    pub const fn name(&self) -> MailName {
        self.name
    }

    #[inline]
    pub const fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    #[inline]
    pub const fn sender(&self) -> Option<&Address> {
        self.envelope.sender()
    }

    pub fn set_sender(&mut self, sender: Option<Address>) {
        *self.envelope.sender_mut() = sender;
    }

    #[inline]
    pub fn recipients(&self) -> &[Address] {
        self.envelope.recipients()
    }

    pub fn set_recipients(&mut self, recipients: Vec<Address>) {
        *self.envelope.recipients_mut() = recipients;
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub const fn state(&self) -> &ProcessingState {
        &self.state
    }

    pub fn set_state(&mut self, state: ProcessingState) {
        self.state = state;
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    #[inline]
    pub const fn attributes(&self) -> &AHashMap<String, String> {
        &self.attributes
    }

    #[inline]
    pub const fn dsn(&self) -> Option<&DsnParameters> {
        self.dsn.as_ref()
    }

    pub fn set_dsn(&mut self, dsn: Option<DsnParameters>) {
        self.dsn = dsn;
    }

    /// All values of the named header, decoded, in the order they appear
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Headers`] if the header block cannot be parsed.
    pub fn header_values(&self, name: &str) -> Result<Vec<String>, MailError> {
        let (headers, _) = mailparse::parse_headers(&self.data)?;
        Ok(headers.get_all_values(name))
    }

    /// The `Message-ID` header, if present and parseable
    #[must_use]
    pub fn message_id(&self) -> Option<String> {
        self.header_values("Message-ID")
            .ok()
            .and_then(|values| values.into_iter().next())
            .map(|id| id.trim().to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const MESSAGE: &[u8] = b"Message-ID: <1234@example.com>\r\n\
        Subject: hello\r\n\
        Received: from a\r\n\
        Received: from b\r\n\
        \r\n\
        body\r\n";

    fn mail() -> Mail {
        Mail::new(
            Envelope::new(
                Some(Address::parse("sender@example.com").unwrap()),
                vec![Address::parse("rcpt@example.com").unwrap()],
            ),
            MESSAGE,
        )
    }

    #[test]
    fn test_duplicate_gets_new_name() {
        let mut original = mail();
        original.set_attribute("key", "value");
        original.set_state(ProcessingState::TRANSPORT);

        let copy = original.duplicate();
        assert_ne!(copy.name(), original.name());
        assert_eq!(copy.envelope(), original.envelope());
        assert_eq!(copy.attribute("key"), Some("value"));
        assert_eq!(copy.state(), &ProcessingState::TRANSPORT);
        assert_eq!(copy.data(), original.data());
    }

    #[test]
    fn test_duplicate_is_independent() {
        let original = mail();
        let mut copy = original.duplicate();
        copy.set_recipients(Vec::new());
        copy.set_attribute("only", "copy");

        assert_eq!(original.recipients().len(), 1);
        assert_eq!(original.attribute("only"), None);
    }

    #[test]
    fn test_header_lookup() {
        let mail = mail();
        assert_eq!(mail.message_id().as_deref(), Some("<1234@example.com>"));
        assert_eq!(
            mail.header_values("received").unwrap(),
            vec!["from a".to_string(), "from b".to_string()]
        );
        assert!(mail.header_values("X-Missing").unwrap().is_empty());
    }

    #[test]
    fn test_processing_state_serde() {
        let state: ProcessingState = ron::from_str("\"custom\"").unwrap();
        assert_eq!(state, ProcessingState::new("custom"));
        assert_eq!(ron::to_string(&ProcessingState::GHOST).unwrap(), "\"ghost\"");
        assert_eq!(ProcessingState::default(), ProcessingState::ROOT);
    }

    #[test]
    fn test_mail_name_round_trips_through_string() {
        let name = MailName::generate();
        assert_eq!(name.to_string().parse::<MailName>().unwrap(), name);
    }
}
