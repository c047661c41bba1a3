//! Ordered merge-diff between two listings
//!
//! Both listings are ascending by relative path, so one forward pass with a
//! single lookahead entry per side classifies every path.

use std::cmp::Ordering;

use crate::error::Result;
use crate::file::File;
use crate::fs::{Filesystem, Listing};

/// Kind of change needed at the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl ActionKind {
    /// Single-letter progress marker
    pub const fn marker(self) -> char {
        match self {
            ActionKind::Create => 'A',
            ActionKind::Update => 'U',
            ActionKind::Delete => 'D',
        }
    }
}

/// One change, carrying the source entry (or the destination entry for deletes)
#[derive(Debug, Clone)]
pub struct Action {
    pub kind: ActionKind,
    pub file: File,
}

impl Action {
    pub fn new(kind: ActionKind, file: File) -> Self {
        Self { kind, file }
    }

    /// Apply the change to `dest`; dry runs touch nothing
    ///
    /// Deletes remove the destination entry itself, by its own key or path.
    pub async fn apply(&self, dest: &Filesystem, dry_run: bool) -> Result<()> {
        if dry_run {
            return Ok(());
        }
        match self.kind {
            ActionKind::Create | ActionKind::Update => dest.create(&self.file).await.map(|_| ()),
            ActionKind::Delete => self.file.delete().await,
        }
    }
}

/// Pull-based merge of a source and a destination listing
pub struct MergeDiff {
    source: Listing,
    dest: Listing,
    delete_extraneous: bool,
    a: Option<File>,
    b: Option<File>,
    primed: bool,
    unchanged: usize,
}

impl MergeDiff {
    pub fn new(source: Listing, dest: Listing, delete_extraneous: bool) -> Self {
        Self {
            source,
            dest,
            delete_extraneous,
            a: None,
            b: None,
            primed: false,
            unchanged: 0,
        }
    }

    /// Paths present on both sides with equal size and fingerprint so far
    pub fn unchanged(&self) -> usize {
        self.unchanged
    }

    /// Next action, or None once both sides are exhausted
    ///
    /// A listing failure on either side ends the merge with that error.
    pub async fn next_action(&mut self) -> Result<Option<Action>> {
        if !self.primed {
            self.a = self.pull_source().await?;
            self.b = self.pull_dest().await?;
            self.primed = true;
        }

        loop {
            let order = match (&self.a, &self.b) {
                (None, None) => return Ok(None),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.relative().cmp(b.relative()),
            };

            match order {
                Ordering::Less => {
                    let file = self.a.take();
                    self.a = self.pull_source().await?;
                    return Ok(file.map(|f| Action::new(ActionKind::Create, f)));
                }
                Ordering::Greater => {
                    let file = self.b.take();
                    self.b = self.pull_dest().await?;
                    if self.delete_extraneous {
                        return Ok(file.map(|f| Action::new(ActionKind::Delete, f)));
                    }
                }
                Ordering::Equal => {
                    let (a, b) = (self.a.take(), self.b.take());
                    self.a = self.pull_source().await?;
                    self.b = self.pull_dest().await?;
                    if let (Some(a), Some(b)) = (a, b) {
                        if differs(&a, &b).await? {
                            return Ok(Some(Action::new(ActionKind::Update, a)));
                        }
                        self.unchanged += 1;
                    }
                }
            }
        }
    }

    async fn pull_source(&mut self) -> Result<Option<File>> {
        let next = self.source.next().await;
        self.check()?;
        Ok(next)
    }

    async fn pull_dest(&mut self) -> Result<Option<File>> {
        let next = self.dest.next().await;
        self.check()?;
        Ok(next)
    }

    fn check(&self) -> Result<()> {
        for listing in [&self.source, &self.dest] {
            if let Some(e) = listing.take_error() {
                return Err(e);
            }
        }
        Ok(())
    }
}

async fn differs(a: &File, b: &File) -> Result<bool> {
    if a.size() != b.size() {
        return Ok(true);
    }
    Ok(a.content_hash().await? != b.content_hash().await?)
}
