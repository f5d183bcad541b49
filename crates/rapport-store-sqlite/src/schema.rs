//! SQL schema for the Rapport SQLite store.
//!
//! Executed once at connection startup. Foreign keys are enforced, and none
//! of them cascade: a meeting with follow-ups, participants or notes cannot
//! be deleted until those references are cleared first.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS profiles (
    user_id     TEXT PRIMARY KEY,
    full_name   TEXT NOT NULL,
    email       TEXT,
    phone       TEXT,
    job_title   TEXT,
    company     TEXT,
    bio         TEXT,
    avatar_url  TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_settings (
    user_id             TEXT PRIMARY KEY REFERENCES profiles(user_id),
    is_private          INTEGER NOT NULL DEFAULT 0,
    email_notifications INTEGER NOT NULL DEFAULT 1,
    updated_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contacts (
    contact_id      TEXT PRIMARY KEY,
    owner_id        TEXT NOT NULL REFERENCES profiles(user_id),
    linked_user_id  TEXT,
    full_name       TEXT NOT NULL,
    job_title       TEXT,
    company         TEXT,
    email           TEXT,
    phone           TEXT,
    avatar_url      TEXT,
    notes           TEXT,
    source          TEXT NOT NULL DEFAULT 'manual', -- 'manual' | 'connection' | 'card'
    created_at      TEXT NOT NULL
);

-- Requests are never deleted; terminal statuses are history.
CREATE TABLE IF NOT EXISTS relationship_requests (
    request_id    TEXT PRIMARY KEY,
    requester_id  TEXT NOT NULL REFERENCES profiles(user_id),
    target_id     TEXT NOT NULL REFERENCES profiles(user_id),
    status        TEXT NOT NULL,   -- 'pending' | 'accepted' | 'declined'
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    CHECK (requester_id != target_id)
);

CREATE TABLE IF NOT EXISTS meetings (
    meeting_id        TEXT PRIMARY KEY,
    organizer_id      TEXT NOT NULL REFERENCES profiles(user_id),
    connection_id     TEXT REFERENCES contacts(contact_id),
    title             TEXT NOT NULL,
    description       TEXT,
    date              TEXT NOT NULL,   -- YYYY-MM-DD
    time              TEXT NOT NULL,   -- HH:MM:SS
    location          TEXT,
    status            TEXT NOT NULL,
    parent_meeting_id TEXT REFERENCES meetings(meeting_id),
    reminder_sent     INTEGER NOT NULL DEFAULT 0,
    follow_up_sent    INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS meeting_participants (
    participant_id  TEXT PRIMARY KEY,
    meeting_id      TEXT NOT NULL REFERENCES meetings(meeting_id),
    email           TEXT NOT NULL,
    display_name    TEXT,
    user_id         TEXT,
    response        TEXT,            -- NULL until answered
    suggested_time  TEXT,
    responded_at    TEXT
);

CREATE TABLE IF NOT EXISTS meeting_notes (
    note_id     TEXT PRIMARY KEY,
    meeting_id  TEXT NOT NULL REFERENCES meetings(meeting_id),
    author_id   TEXT NOT NULL,
    body        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS introductions (
    introduction_id TEXT PRIMARY KEY,
    sender_id       TEXT NOT NULL REFERENCES profiles(user_id),
    message         TEXT,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS introduction_participants (
    introduction_id TEXT NOT NULL REFERENCES introductions(introduction_id),
    user_id         TEXT NOT NULL,
    response        TEXT NOT NULL DEFAULT 'pending',
    responded_at    TEXT,
    PRIMARY KEY (introduction_id, user_id)
);

-- Write-once apart from `read`.
CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    recipient_id    TEXT NOT NULL,
    kind            TEXT NOT NULL,
    title           TEXT NOT NULL,
    message         TEXT NOT NULL,
    payload         TEXT NOT NULL DEFAULT '{}',
    read            INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS contacts_owner_idx        ON contacts(owner_id);
CREATE INDEX IF NOT EXISTS requests_requester_idx    ON relationship_requests(requester_id);
CREATE INDEX IF NOT EXISTS requests_target_idx       ON relationship_requests(target_id);
CREATE INDEX IF NOT EXISTS meetings_organizer_idx    ON meetings(organizer_id);
CREATE INDEX IF NOT EXISTS meetings_parent_idx       ON meetings(parent_meeting_id);
CREATE INDEX IF NOT EXISTS participants_meeting_idx  ON meeting_participants(meeting_id);
CREATE INDEX IF NOT EXISTS participants_user_idx     ON meeting_participants(user_id);
CREATE INDEX IF NOT EXISTS notifications_recipient_idx ON notifications(recipient_id);

PRAGMA user_version = 1;
";
