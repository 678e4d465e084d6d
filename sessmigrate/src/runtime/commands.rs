use crate::ttl::Ttl;

/// A single destination operation inside a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCommand {
    Set { key: String, payload: Vec<u8> },
    Expire { key: String, ttl: Ttl },
}

impl WriteCommand {
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } | Self::Expire { key, .. } => key,
        }
    }
}

/// Operations submitted together as one round trip.
///
/// The anchor is the first key enqueued in the chunk, the key a
/// cluster-aware executor would route the batch by. The shipped executors
/// target a single node and only report it.
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub chunk: u64,
    pub anchor: Option<String>,
    pub commands: Vec<WriteCommand>,
}

impl WriteBatch {
    pub fn new(chunk: u64) -> Self {
        Self {
            chunk,
            ..Self::default()
        }
    }

    pub fn with_capacity(chunk: u64, entries: usize) -> Self {
        Self {
            chunk,
            anchor: None,
            commands: Vec::with_capacity(entries * 2),
        }
    }

    /// Adds the `SET` and `EXPIRE` pair for one session.
    pub fn push_entry(&mut self, key: String, payload: Vec<u8>, ttl: Ttl) {
        if self.anchor.is_none() {
            self.anchor = Some(key.clone());
        }
        self.commands.push(WriteCommand::Set {
            key: key.clone(),
            payload,
        });
        self.commands.push(WriteCommand::Expire { key, ttl });
    }

    /// Number of sessions in the batch.
    pub fn entries(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, WriteCommand::Set { .. }))
            .count()
    }

    pub fn operations(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
