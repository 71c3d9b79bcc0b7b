use std::fmt;

/// Watermark derived from the highest stored item id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Empty,
    At(i64),
}

impl Cursor {
    pub fn from_highest_id(highest: Option<i64>) -> Self {
        highest.map_or(Cursor::Empty, Cursor::At)
    }

    /// An empty store asks for a bounded first batch; otherwise only items
    /// strictly newer than the watermark are requested.
    pub fn request(self, initial_count: u32) -> FetchRequest {
        match self {
            Cursor::Empty => FetchRequest::Initial {
                count: initial_count,
            },
            Cursor::At(id) => FetchRequest::Since { id },
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Empty => write!(f, "none"),
            Cursor::At(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRequest {
    /// First run: one page of at most `count` items.
    Initial { count: u32 },
    /// Every item with an id greater than `id`, across all pages.
    Since { id: i64 },
}

impl FetchRequest {
    /// Whether an item with this id belongs in the response.
    pub fn wants(&self, item_id: i64) -> bool {
        match self {
            FetchRequest::Initial { .. } => true,
            FetchRequest::Since { id } => item_id > *id,
        }
    }
}
