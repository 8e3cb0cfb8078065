//! The columnar batch builder (spec.md §4.C). `Block` holds one vector per
//! column, matching §3's literal "ordered list of column builders" model;
//! `commit` zips those columns into owned rows only at the DB-insert
//! boundary, because the `clickhouse` client's native API inserts rows, not
//! columns (see DESIGN.md).

use std::net::Ipv6Addr;

use crate::invariants::debug_assert_columns_aligned;
use crate::schema;

/// One row as the database sees it: `timestamp` followed by the ten fields
/// of spec.md §3, in order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, clickhouse::Row)]
pub struct AccessLogRow {
    pub timestamp: u64,
    #[serde(with = "clickhouse::serde::ipv6")]
    pub address: Ipv6Addr,
    pub method: u8,
    pub version: u8,
    pub status: u16,
    pub response_content_length: u32,
    pub response_time: u32,
    pub vhost: String,
    pub uri: String,
    pub referer: String,
    pub user_agent: String,
}

/// A growing columnar block. All columns are kept at equal length by
/// construction: every `push_event` call appends exactly one value (real or
/// zero) to every column before returning (spec §3 Block invariant, §8
/// invariant 1).
#[derive(Debug, Default)]
pub struct Block {
    timestamp: Vec<u64>,
    address: Vec<Ipv6Addr>,
    method: Vec<u8>,
    version: Vec<u8>,
    status: Vec<u16>,
    response_content_length: Vec<u32>,
    response_time: Vec<u32>,
    vhost: Vec<String>,
    uri: Vec<String>,
    referer: Vec<String>,
    user_agent: Vec<String>,
}

/// One decoded `ACCESS` event, ready to be appended as a single row across
/// all columns. Absent fields already carry their zero value — the decoder
/// is responsible for that substitution (spec §4.B).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEvent {
    pub timestamp: u64,
    pub address: Ipv6Addr,
    pub method: u8,
    pub version: u8,
    pub status: u16,
    pub response_content_length: u32,
    pub response_time: u32,
    pub vhost: String,
    pub uri: String,
    pub referer: String,
    pub user_agent: String,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row count. All columns share this length (debug-asserted below).
    pub fn len(&self) -> usize {
        self.timestamp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends one fully-decoded event as a new row to every column.
    pub fn push_event(&mut self, event: AccessEvent) {
        let before = self.len();
        self.timestamp.push(event.timestamp);
        self.address.push(event.address);
        self.method.push(event.method);
        self.version.push(event.version);
        self.status.push(event.status);
        self.response_content_length
            .push(event.response_content_length);
        self.response_time.push(event.response_time);
        self.vhost.push(event.vhost);
        self.uri.push(event.uri);
        self.referer.push(event.referer);
        self.user_agent.push(event.user_agent);
        self.debug_assert_aligned(before + 1);
    }

    /// Truncates every column back to `len`, used when a mid-event bounds
    /// check fails and the partially-appended row must be rolled back
    /// (spec §4.B Atomicity). In practice no column is ever partially
    /// pushed — `push_event` takes a fully-assembled `AccessEvent` — but
    /// this is kept as the explicit rollback point the spec calls for, and
    /// is exercised by the decoder before it ever calls `push_event`.
    pub fn truncate(&mut self, len: usize) {
        self.timestamp.truncate(len);
        self.address.truncate(len);
        self.method.truncate(len);
        self.version.truncate(len);
        self.status.truncate(len);
        self.response_content_length.truncate(len);
        self.response_time.truncate(len);
        self.vhost.truncate(len);
        self.uri.truncate(len);
        self.referer.truncate(len);
        self.user_agent.truncate(len);
    }

    fn debug_assert_aligned(&self, expected: usize) {
        debug_assert_columns_aligned!(expected, self.timestamp.len(), "timestamp");
        debug_assert_columns_aligned!(expected, self.address.len(), "address");
        debug_assert_columns_aligned!(expected, self.method.len(), "method");
        debug_assert_columns_aligned!(expected, self.version.len(), "version");
        debug_assert_columns_aligned!(expected, self.status.len(), "status");
        debug_assert_columns_aligned!(
            expected,
            self.response_content_length.len(),
            "response_content_length"
        );
        debug_assert_columns_aligned!(expected, self.response_time.len(), "response_time");
        debug_assert_columns_aligned!(expected, self.vhost.len(), "vhost");
        debug_assert_columns_aligned!(expected, self.uri.len(), "uri");
        debug_assert_columns_aligned!(expected, self.referer.len(), "referer");
        debug_assert_columns_aligned!(expected, self.user_agent.len(), "user_agent");
    }

    /// Zips the columns into owned rows for the DB insert boundary. Drains
    /// `self`, leaving an empty block behind (the caller replaces it with a
    /// fresh `Block` after commit, per spec §4.C).
    pub fn into_rows(mut self) -> Vec<AccessLogRow> {
        let n = self.len();
        let mut rows = Vec::with_capacity(n);
        // Drain each column in lockstep; draining back-to-front via `pop`
        // would reverse order, so take ownership via `std::mem::take` and
        // zip with `into_iter` instead.
        let timestamp = std::mem::take(&mut self.timestamp);
        let address = std::mem::take(&mut self.address);
        let method = std::mem::take(&mut self.method);
        let version = std::mem::take(&mut self.version);
        let status = std::mem::take(&mut self.status);
        let response_content_length = std::mem::take(&mut self.response_content_length);
        let response_time = std::mem::take(&mut self.response_time);
        let vhost = std::mem::take(&mut self.vhost);
        let uri = std::mem::take(&mut self.uri);
        let referer = std::mem::take(&mut self.referer);
        let user_agent = std::mem::take(&mut self.user_agent);

        let mut timestamp = timestamp.into_iter();
        let mut address = address.into_iter();
        let mut method = method.into_iter();
        let mut version = version.into_iter();
        let mut status = status.into_iter();
        let mut response_content_length = response_content_length.into_iter();
        let mut response_time = response_time.into_iter();
        let mut vhost = vhost.into_iter();
        let mut uri = uri.into_iter();
        let mut referer = referer.into_iter();
        let mut user_agent = user_agent.into_iter();

        for _ in 0..n {
            rows.push(AccessLogRow {
                timestamp: timestamp.next().unwrap(),
                address: address.next().unwrap(),
                method: method.next().unwrap(),
                version: version.next().unwrap(),
                status: status.next().unwrap(),
                response_content_length: response_content_length.next().unwrap(),
                response_time: response_time.next().unwrap(),
                vhost: vhost.next().unwrap(),
                uri: uri.next().unwrap(),
                referer: referer.next().unwrap(),
                user_agent: user_agent.next().unwrap(),
            });
        }
        rows
    }
}

/// The zero value for a given optional-field ordinal, used by the decoder
/// when the mask marks a field absent (spec §3, §8 invariant 4).
pub fn zero_address() -> Ipv6Addr {
    Ipv6Addr::UNSPECIFIED
}

pub const fn zero_u8() -> u8 {
    0
}

pub const fn zero_u16() -> u16 {
    0
}

pub const fn zero_u32() -> u32 {
    0
}

pub fn zero_string() -> String {
    String::new()
}
