/// A persisted state table: one JSON object keyed by record id.
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub file_name: &'static str,
}

/// Upload tokens: token id -> Token
pub const TOKENS: TableDef = TableDef {
    name: "tokens",
    file_name: "tokens.json",
};

/// Share sessions: session id -> Session (files + short links)
pub const SESSIONS: TableDef = TableDef {
    name: "sessions",
    file_name: "sessions.json",
};
