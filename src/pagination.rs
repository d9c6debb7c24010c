//! Cursor pagination over deterministically ordered organization listings.
//!
//! Listings are ordered by a [`SortKey`] (creation time or name) and broken
//! by organization id, so every organization has a unique [`Position`]. A
//! cursor records the position of the last (or first) item of a page together
//! with the sort key, order and direction, and is signed with HMAC-SHA256.
//! Cursors never carry offsets: a page continues strictly after (or before) a
//! key value, so concurrent inserts and deletes elsewhere in the set
//! do not shift pages.
//!
//! # Token format
//!
//! ```text
//! base64url(json payload) "." base64url(hmac_sha256(secret, payload))
//! ```

use crate::error::{OrganizationError, OrganizationResult};
use crate::model::{Organization, SortOrder};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::cmp::Ordering;

const CURSOR_VERSION: u8 = 1;

type HmacSha256 = Hmac<Sha256>;

/// Attribute a listing is sorted by. Ties are always broken by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Created,
    Name,
}

/// Which way a cursor continues from its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CursorDirection {
    After,
    Before,
}

/// Sort key value of one organization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum SortValue {
    Created(DateTime<Utc>),
    Name(String),
}

/// Unique position of an organization within a sorted listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub value: SortValue,
    pub id: String,
}

impl Position {
    pub fn of(org: &Organization, key: SortKey) -> Self {
        let value = match key {
            SortKey::Created => SortValue::Created(org.created),
            SortKey::Name => SortValue::Name(org.name.clone()),
        };
        Self {
            value,
            id: org.id.clone(),
        }
    }

    /// Ascending comparison of this position against an organization.
    pub fn cmp_org(&self, org: &Organization, key: SortKey) -> Ordering {
        self.cmp(&Position::of(org, key))
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Compare two organizations in the given sort order.
pub fn compare_organizations(
    a: &Organization,
    b: &Organization,
    key: SortKey,
    order: SortOrder,
) -> Ordering {
    let ordering = Position::of(a, key).cmp(&Position::of(b, key));
    match order {
        SortOrder::Ascending => ordering,
        SortOrder::Descending => ordering.reverse(),
    }
}

/// Whether `org` comes strictly after `position` when scanning in `order`.
pub fn is_past(position: &Position, org: &Organization, key: SortKey, order: SortOrder) -> bool {
    match order {
        SortOrder::Ascending => position.cmp_org(org, key) == Ordering::Less,
        SortOrder::Descending => position.cmp_org(org, key) == Ordering::Greater,
    }
}

/// Decoded pagination cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "v")]
    version: u8,
    pub sort_key: SortKey,
    pub ascending: bool,
    pub direction: CursorDirection,
    pub position: Position,
}

impl Cursor {
    pub fn new(
        sort_key: SortKey,
        sort_order: SortOrder,
        direction: CursorDirection,
        position: Position,
    ) -> Self {
        Self {
            version: CURSOR_VERSION,
            sort_key,
            ascending: sort_order == SortOrder::Ascending,
            direction,
            position,
        }
    }

    pub fn sort_order(&self) -> SortOrder {
        if self.ascending {
            SortOrder::Ascending
        } else {
            SortOrder::Descending
        }
    }
}

/// Encodes and verifies signed cursor tokens.
#[derive(Clone)]
pub struct CursorCodec {
    secret: Vec<u8>,
}

impl std::fmt::Debug for CursorCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorCodec").finish_non_exhaustive()
    }
}

impl CursorCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, payload: &[u8]) -> OrganizationResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| OrganizationError::invariant(format!("Invalid cursor key: {}", e)))?;
        mac.update(payload);
        Ok(mac)
    }

    /// Encode a cursor as an opaque token.
    pub fn encode(&self, cursor: &Cursor) -> OrganizationResult<String> {
        let payload = serde_json::to_vec(cursor)
            .map_err(|e| OrganizationError::invariant(format!("Failed to encode cursor: {}", e)))?;
        let signature = self.mac(&payload)?.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Decode a token and check it belongs to a listing with the given sort
    /// key, order and direction.
    pub fn decode(
        &self,
        token: &str,
        sort_key: SortKey,
        sort_order: SortOrder,
        direction: CursorDirection,
    ) -> OrganizationResult<Cursor> {
        let invalid = || OrganizationError::bad_request("Invalid pagination cursor");

        let (payload, signature) = token.trim().split_once('.').ok_or_else(invalid)?;
        let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| invalid())?;
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;
        self.mac(&payload)?
            .verify_slice(&signature)
            .map_err(|_| invalid())?;

        let cursor: Cursor = serde_json::from_slice(&payload).map_err(|_| invalid())?;
        if cursor.version != CURSOR_VERSION {
            return Err(invalid());
        }
        if cursor.sort_key != sort_key || cursor.sort_order() != sort_order {
            return Err(OrganizationError::bad_request(
                "Pagination cursor was issued for a different sort order",
            ));
        }
        if cursor.direction != direction {
            return Err(OrganizationError::bad_request(
                "Pagination cursor was issued for the opposite direction",
            ));
        }
        Ok(cursor)
    }
}

/// One page of a listing with cursors to its neighbours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            previous_cursor: None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Bookkeeping for assembling one page out of a directional scan.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub limit: usize,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
    /// Position to continue from and which way
    pub cursor: Option<Cursor>,
}

impl PageRequest {
    pub fn is_backward(&self) -> bool {
        matches!(
            self.cursor,
            Some(Cursor {
                direction: CursorDirection::Before,
                ..
            })
        )
    }

    /// Order in which the store has to be scanned to fill this page.
    pub fn scan_order(&self) -> SortOrder {
        match (self.is_backward(), self.sort_order) {
            (false, order) => order,
            (true, SortOrder::Ascending) => SortOrder::Descending,
            (true, SortOrder::Descending) => SortOrder::Ascending,
        }
    }

    pub fn start(&self) -> Option<Position> {
        self.cursor.as_ref().map(|c| c.position.clone())
    }

    /// Turn up to `limit + 1` matches collected in scan order into a page.
    pub fn finish(
        &self,
        codec: &CursorCodec,
        mut matches: Vec<Organization>,
    ) -> OrganizationResult<Page<Organization>> {
        let overflow = matches.len() > self.limit;
        matches.truncate(self.limit);

        let backward = self.is_backward();
        if backward {
            matches.reverse();
        }

        let (more_after, more_before) = if backward {
            (self.cursor.is_some(), overflow)
        } else {
            (overflow, self.cursor.is_some())
        };

        let mut page = Page {
            items: Vec::new(),
            next_cursor: None,
            previous_cursor: None,
        };
        if let (true, Some(last)) = (more_after, matches.last()) {
            page.next_cursor = Some(codec.encode(&Cursor::new(
                self.sort_key,
                self.sort_order,
                CursorDirection::After,
                Position::of(last, self.sort_key),
            ))?);
        }
        if let (true, Some(first)) = (more_before, matches.first()) {
            page.previous_cursor = Some(codec.encode(&Cursor::new(
                self.sort_key,
                self.sort_order,
                CursorDirection::Before,
                Position::of(first, self.sort_key),
            ))?);
        }
        page.items = matches;
        Ok(page)
    }
}
