//! The FocusFlow schema: one database, eight user-owned collections.
//!
//! Collection ids are fixed so that the application and later admin runs can
//! refer to them without reading anything back from the server.

use crate::schema::{
    AttributeSpec, CollectionSpec, DatabaseSpec, IndexSpec, Permission, Role, SortOrder,
};

/// Fixed identifiers for the database and its collections.
pub mod ids {
    pub const DATABASE: &str = "focusflow";
    pub const TASKS: &str = "tasks";
    pub const POMODORO: &str = "pomodoro_sessions";
    pub const NOTES: &str = "notes";
    pub const FOLDERS: &str = "folders";
    pub const SETTINGS: &str = "settings";
    pub const CALENDAR_EVENTS: &str = "calendar_events";
    pub const TIME_BLOCKS: &str = "time_blocks";
    pub const PRODUCTIVITY_GOALS: &str = "productivity_goals";

    /// Every collection id, in provisioning order.
    pub const ALL: [&str; 8] = [
        TASKS,
        POMODORO,
        NOTES,
        FOLDERS,
        SETTINGS,
        CALENDAR_EVENTS,
        TIME_BLOCKS,
        PRODUCTIVITY_GOALS,
    ];
}

/// Appwrite document ids are at most 36 characters.
const ID_SIZE: u32 = 36;
const TITLE_SIZE: u32 = 255;
const TEXT_SIZE: u32 = 10_000;
const NOTE_SIZE: u32 = 1_000_000;
const COLOR_SIZE: u32 = 20;

/// The complete FocusFlow database descriptor.
#[must_use]
pub fn focusflow() -> DatabaseSpec {
    DatabaseSpec {
        id: ids::DATABASE.to_string(),
        name: "FocusFlow".to_string(),
        collections: vec![
            tasks(),
            pomodoro_sessions(),
            notes(),
            folders(),
            settings(),
            calendar_events(),
            time_blocks(),
            productivity_goals(),
        ],
    }
}

fn owned(id: &str, name: &str) -> CollectionSpec {
    CollectionSpec::new(id, name)
        .permissions(Permission::crud(&Role::Users))
        .attribute(AttributeSpec::string("userId", ID_SIZE).required())
}

fn by_user(collection: &str) -> IndexSpec {
    IndexSpec::key(format!("{collection}_user_idx"), ["userId"])
}

fn tasks() -> CollectionSpec {
    owned(ids::TASKS, "Tasks")
        .attribute(AttributeSpec::string("title", TITLE_SIZE).required())
        .attribute(AttributeSpec::string("description", TEXT_SIZE))
        .attribute(
            AttributeSpec::enumeration("status", ["todo", "in_progress", "done"])
                .default_str("todo"),
        )
        .attribute(
            AttributeSpec::enumeration("priority", ["low", "medium", "high"])
                .default_str("medium"),
        )
        .attribute(AttributeSpec::datetime("dueDate"))
        .attribute(AttributeSpec::boolean("completed").default_bool(false))
        .attribute(AttributeSpec::datetime("completedAt"))
        .attribute(AttributeSpec::string("tags", 50).array())
        .attribute(AttributeSpec::string("folderId", ID_SIZE))
        .attribute(AttributeSpec::integer("estimatedPomodoros").range(0, 100).default_int(1))
        .attribute(AttributeSpec::integer("completedPomodoros").range(0, 1000).default_int(0))
        .attribute(AttributeSpec::integer("order").default_int(0))
        .index(by_user(ids::TASKS))
        .index(IndexSpec::key("tasks_user_status_idx", ["userId", "status"]))
        .index(
            IndexSpec::key("tasks_user_due_idx", ["userId", "dueDate"])
                .orders(vec![SortOrder::Asc, SortOrder::Asc]),
        )
        .index(IndexSpec::fulltext("tasks_title_search", ["title"]))
}

fn pomodoro_sessions() -> CollectionSpec {
    owned(ids::POMODORO, "Pomodoro Sessions")
        .attribute(AttributeSpec::string("taskId", ID_SIZE))
        .attribute(
            AttributeSpec::enumeration("type", ["work", "short_break", "long_break"]).required(),
        )
        .attribute(AttributeSpec::integer("duration").range(1, 240).required())
        .attribute(AttributeSpec::datetime("startedAt").required())
        .attribute(AttributeSpec::datetime("completedAt"))
        .attribute(AttributeSpec::boolean("completed").default_bool(false))
        .attribute(AttributeSpec::boolean("interrupted").default_bool(false))
        .index(by_user(ids::POMODORO))
        .index(
            IndexSpec::key("pomodoro_user_started_idx", ["userId", "startedAt"])
                .orders(vec![SortOrder::Asc, SortOrder::Desc]),
        )
}

fn notes() -> CollectionSpec {
    owned(ids::NOTES, "Notes")
        .attribute(AttributeSpec::string("title", TITLE_SIZE).required())
        .attribute(AttributeSpec::string("content", NOTE_SIZE))
        .attribute(AttributeSpec::string("folderId", ID_SIZE))
        .attribute(AttributeSpec::string("tags", 50).array())
        .attribute(AttributeSpec::boolean("pinned").default_bool(false))
        .attribute(AttributeSpec::datetime("updatedAt"))
        .index(by_user(ids::NOTES))
        .index(IndexSpec::key("notes_user_folder_idx", ["userId", "folderId"]))
        .index(IndexSpec::fulltext("notes_title_search", ["title"]))
}

fn folders() -> CollectionSpec {
    owned(ids::FOLDERS, "Folders")
        .attribute(AttributeSpec::string("name", 100).required())
        .attribute(AttributeSpec::string("color", COLOR_SIZE).default_str("#6366f1"))
        .attribute(AttributeSpec::string("parentId", ID_SIZE))
        .attribute(AttributeSpec::integer("order").default_int(0))
        .index(by_user(ids::FOLDERS))
}

fn settings() -> CollectionSpec {
    owned(ids::SETTINGS, "Settings")
        .attribute(
            AttributeSpec::enumeration("theme", ["light", "dark", "system"]).default_str("system"),
        )
        .attribute(AttributeSpec::integer("pomodoroDuration").range(1, 120).default_int(25))
        .attribute(AttributeSpec::integer("shortBreakDuration").range(1, 60).default_int(5))
        .attribute(AttributeSpec::integer("longBreakDuration").range(1, 120).default_int(15))
        .attribute(AttributeSpec::integer("longBreakInterval").range(1, 12).default_int(4))
        .attribute(AttributeSpec::boolean("autoStartBreaks").default_bool(false))
        .attribute(AttributeSpec::boolean("autoStartPomodoros").default_bool(false))
        .attribute(AttributeSpec::boolean("notificationsEnabled").default_bool(true))
        .attribute(AttributeSpec::boolean("soundEnabled").default_bool(true))
        .attribute(AttributeSpec::integer("dailyGoal").range(1, 50).default_int(8))
        .index(IndexSpec::unique("settings_user_unique", ["userId"]))
}

fn calendar_events() -> CollectionSpec {
    owned(ids::CALENDAR_EVENTS, "Calendar Events")
        .attribute(AttributeSpec::string("title", TITLE_SIZE).required())
        .attribute(AttributeSpec::string("description", TEXT_SIZE))
        .attribute(AttributeSpec::datetime("startTime").required())
        .attribute(AttributeSpec::datetime("endTime").required())
        .attribute(AttributeSpec::boolean("allDay").default_bool(false))
        .attribute(AttributeSpec::string("color", COLOR_SIZE))
        .attribute(AttributeSpec::string("taskId", ID_SIZE))
        .attribute(
            AttributeSpec::enumeration("recurrence", ["none", "daily", "weekly", "monthly"])
                .default_str("none"),
        )
        .index(by_user(ids::CALENDAR_EVENTS))
        .index(IndexSpec::key("events_user_start_idx", ["userId", "startTime"]))
}

fn time_blocks() -> CollectionSpec {
    owned(ids::TIME_BLOCKS, "Time Blocks")
        .attribute(AttributeSpec::string("title", TITLE_SIZE).required())
        .attribute(AttributeSpec::datetime("startTime").required())
        .attribute(AttributeSpec::datetime("endTime").required())
        .attribute(AttributeSpec::string("taskId", ID_SIZE))
        .attribute(AttributeSpec::string("color", COLOR_SIZE))
        .attribute(AttributeSpec::boolean("completed").default_bool(false))
        .index(by_user(ids::TIME_BLOCKS))
        .index(IndexSpec::key("blocks_user_start_idx", ["userId", "startTime"]))
}

fn productivity_goals() -> CollectionSpec {
    owned(ids::PRODUCTIVITY_GOALS, "Productivity Goals")
        .attribute(AttributeSpec::string("title", TITLE_SIZE).required())
        .attribute(AttributeSpec::enumeration("type", ["daily", "weekly", "monthly"]).required())
        .attribute(AttributeSpec::integer("target").range(1, 10_000).required())
        .attribute(AttributeSpec::integer("progress").range(0, 10_000).default_int(0))
        .attribute(AttributeSpec::datetime("startDate"))
        .attribute(AttributeSpec::datetime("endDate"))
        .attribute(AttributeSpec::boolean("completed").default_bool(false))
        .index(by_user(ids::PRODUCTIVITY_GOALS))
        .index(IndexSpec::key("goals_user_type_idx", ["userId", "type"]))
}
