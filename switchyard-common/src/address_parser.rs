//! RFC 5321 mailbox grammar
//!
//! ```text
//! Mailbox        = Local-part "@" ( Domain / address-literal )
//! Local-part     = Dot-string / Quoted-string
//! Dot-string     = Atom *("." Atom)
//! Quoted-string  = DQUOTE *QcontentSMTP DQUOTE
//! Domain         = sub-domain *("." sub-domain)
//! sub-domain     = Let-dig [Ldh-str]
//! ```
//!
//! Only the mailbox production is needed here: mapping targets and
//! recipients arrive already stripped of SMTP path syntax, apart from an
//! optional pair of angle brackets.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::AddressError;

const MAX_LOCAL_PART: usize = 64;
const MAX_DOMAIN: usize = 255;

pub type Result<T> = std::result::Result<T, AddressError>;

/// Split and validate `local-part@domain`, returning both halves verbatim.
///
/// # Errors
///
/// Returns an [`AddressError`] describing the first grammar violation.
pub fn parse_mailbox(input: &str) -> Result<(&str, &str)> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AddressError::Empty);
    }

    let input = match (input.strip_prefix('<'), input.ends_with('>')) {
        (Some(rest), true) => &rest[..rest.len() - 1],
        (Some(_), false) => return Err(AddressError::MissingCloseBracket),
        (None, _) => input,
    };

    let at = find_unquoted_at(input).ok_or(AddressError::MissingAtSign)?;
    let (local_part, domain) = (&input[..at], &input[at + 1..]);

    if local_part.len() > MAX_LOCAL_PART {
        return Err(AddressError::LocalPartTooLong);
    }
    if domain.len() > MAX_DOMAIN {
        return Err(AddressError::DomainTooLong);
    }

    if local_part.starts_with('"') {
        validate_quoted_string(local_part)?;
    } else {
        validate_dot_string(local_part)?;
    }

    if domain.starts_with('[') {
        validate_address_literal(domain)?;
    } else {
        validate_domain(domain)?;
    }

    Ok((local_part, domain))
}

/// Position of the `@` separating local part from domain, skipping any that
/// sit inside a quoted local part or an address literal.
fn find_unquoted_at(input: &str) -> Option<usize> {
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut escaped = false;

    for (i, ch) in input.char_indices() {
        match ch {
            '"' if !escaped && !in_brackets => in_quotes = !in_quotes,
            '[' if !in_quotes => in_brackets = true,
            ']' if !in_quotes => in_brackets = false,
            '@' if !in_quotes && !in_brackets => return Some(i),
            _ => {}
        }
        escaped = ch == '\\' && !escaped;
    }

    None
}

fn validate_dot_string(input: &str) -> Result<()> {
    if input.is_empty() {
        return Err(AddressError::InvalidLocalPart("empty local part".into()));
    }

    for atom in input.split('.') {
        if atom.is_empty() {
            return Err(AddressError::InvalidLocalPart(format!(
                "empty atom in '{input}'"
            )));
        }
        if let Some(ch) = atom.chars().find(|&ch| !is_atext(ch)) {
            return Err(AddressError::InvalidLocalPart(format!(
                "invalid character '{ch}'"
            )));
        }
    }

    Ok(())
}

fn validate_quoted_string(input: &str) -> Result<()> {
    let content = input
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or(AddressError::UnclosedQuotedString)?;

    let mut chars = content.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(next) if next.is_ascii_graphic() || next == ' ' => {}
                Some(next) => {
                    return Err(AddressError::InvalidQuotedString(format!(
                        "invalid quoted pair '\\{next}'"
                    )));
                }
                None => return Err(AddressError::UnclosedQuotedString),
            }
        } else if !is_qtext_smtp(ch) {
            return Err(AddressError::InvalidQuotedString(format!(
                "invalid character '{ch}'"
            )));
        }
    }

    Ok(())
}

fn validate_domain(input: &str) -> Result<()> {
    if input.is_empty() {
        return Err(AddressError::InvalidDomain("empty domain".into()));
    }

    input.split('.').try_for_each(validate_subdomain)
}

fn validate_subdomain(label: &str) -> Result<()> {
    let starts_ok = label.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    let ends_ok = label.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());

    if !starts_ok || !ends_ok {
        return Err(AddressError::InvalidDomain(format!(
            "label '{label}' must start and end with a letter or digit"
        )));
    }

    if let Some(ch) = label
        .chars()
        .find(|&ch| !ch.is_ascii_alphanumeric() && ch != '-')
    {
        return Err(AddressError::InvalidDomain(format!(
            "invalid character '{ch}' in '{label}'"
        )));
    }

    Ok(())
}

fn validate_address_literal(input: &str) -> Result<()> {
    let content = input
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| AddressError::InvalidAddressLiteral(input.to_string()))?;

    if content.parse::<Ipv4Addr>().is_ok() {
        return Ok(());
    }

    if let Some(v6) = content.strip_prefix("IPv6:")
        && v6.parse::<Ipv6Addr>().is_ok()
    {
        return Ok(());
    }

    match content.split_once(':') {
        Some((tag, value)) if !tag.is_empty() && !value.is_empty() => Ok(()),
        _ => Err(AddressError::InvalidAddressLiteral(content.to_string())),
    }
}

#[inline]
const fn is_atext(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '!' | '#'
                | '$'
                | '%'
                | '&'
                | '\''
                | '*'
                | '+'
                | '-'
                | '/'
                | '='
                | '?'
                | '^'
                | '_'
                | '`'
                | '{'
                | '|'
                | '}'
                | '~'
        )
}

/// Printable ASCII except backslash and double quote
#[inline]
const fn is_qtext_smtp(ch: char) -> bool {
    matches!(ch as u32, 32..=33 | 35..=91 | 93..=126)
}
