//! Bucket cursor
//!
//! Tracks the path from the bucket root down to the current leaf element as
//! a stack of (page, index) pairs. Moving past the edge of a page pops up to
//! the nearest ancestor that still has a sibling in the walking direction and
//! descends again from there.

use crate::error::{DumpError, Result};

use super::bucket::Root;
use super::db::Db;
use super::page::Page;
use super::BUCKET_LEAF_FLAG;

/// Deepest branch path accepted before the tree is treated as corrupt
const MAX_DEPTH: usize = 64;

/// (key, value) — a `None` value marks a nested bucket
pub type Item = (Vec<u8>, Option<Vec<u8>>);

/// (key, value, leaf flags)
pub(crate) type RawItem = (Vec<u8>, Vec<u8>, u32);

#[derive(Debug)]
struct ElemRef {
    page: Page,
    index: usize,
}

impl ElemRef {
    fn is_empty_leaf(&self) -> bool {
        self.page.is_leaf() && self.page.count() == 0
    }
}

/// Cursor over one bucket, valid for the lifetime of the transaction
#[derive(Debug)]
pub struct Cursor<'db> {
    db: &'db Db,
    root: Root,
    stack: Vec<ElemRef>,
}

impl<'db> Cursor<'db> {
    pub(crate) fn new(db: &'db Db, root: Root) -> Self {
        Self {
            db,
            root,
            stack: Vec::new(),
        }
    }

    // =========================================================================
    // Positioning
    // =========================================================================

    /// Move to the first entry of the bucket
    pub fn first(&mut self) -> Result<Option<Item>> {
        self.stack.clear();
        let root = self.root_page()?;
        self.stack.push(ElemRef {
            page: root,
            index: 0,
        });
        self.descend_first()?;
        self.skip_empty_forward()?;
        self.current()
    }

    /// Move to the last entry of the bucket
    pub fn last(&mut self) -> Result<Option<Item>> {
        self.stack.clear();
        let root = self.root_page()?;
        let index = root.count().saturating_sub(1);
        self.stack.push(ElemRef { page: root, index });
        self.descend_last()?;
        self.skip_empty_backward()?;
        self.current()
    }

    /// Step to the next entry; `None` once past the last one
    pub fn next(&mut self) -> Result<Option<Item>> {
        self.step_forward()?;
        self.skip_empty_forward()?;
        self.current()
    }

    /// Step to the previous entry; `None` once before the first one
    pub fn prev(&mut self) -> Result<Option<Item>> {
        self.step_back()?;
        self.skip_empty_backward()?;
        self.current()
    }

    /// Move to the first entry whose key is `>= target`
    pub fn seek(&mut self, target: &[u8]) -> Result<Option<Item>> {
        Ok(self.seek_raw(target)?.map(|(key, value, flags)| {
            let value = (flags & BUCKET_LEAF_FLAG == 0).then_some(value);
            (key, value)
        }))
    }

    pub(crate) fn seek_raw(&mut self, target: &[u8]) -> Result<Option<RawItem>> {
        self.stack.clear();
        let mut page = self.root_page()?;
        loop {
            let count = page.count();
            let index = lower_bound(&page, target)?;

            if page.is_leaf() {
                self.stack.push(ElemRef { page, index });
                break;
            }
            if count == 0 {
                return Err(DumpError::Corrupt(format!(
                    "branch page {} has no elements",
                    page.id()
                )));
            }

            // Branch: follow the child whose range covers `target`.
            let exact = index < count && page.key_at(index)? == target;
            let index = if !exact && index > 0 { index - 1 } else { index };
            let index = index.min(count - 1);
            let child = page.branch_element(index)?.pgid;
            self.stack.push(ElemRef { page, index });
            page = self.read_child(child)?;
        }

        if matches!(self.stack.last(), Some(top) if top.index >= top.page.count()) {
            self.step_forward()?;
            self.skip_empty_forward()?;
        }
        self.current_raw()
    }

    // =========================================================================
    // Stack Movement
    // =========================================================================

    fn step_forward(&mut self) -> Result<()> {
        loop {
            match self.stack.last_mut() {
                None => return Ok(()),
                Some(top) if top.index + 1 < top.page.count() => {
                    top.index += 1;
                    break;
                }
                Some(_) => {
                    self.stack.pop();
                }
            }
        }
        self.descend_first()
    }

    fn step_back(&mut self) -> Result<()> {
        loop {
            match self.stack.last_mut() {
                None => return Ok(()),
                Some(top) if top.index > 0 && top.index <= top.page.count() => {
                    top.index -= 1;
                    break;
                }
                Some(_) => {
                    self.stack.pop();
                }
            }
        }
        self.descend_last()
    }

    fn skip_empty_forward(&mut self) -> Result<()> {
        while self.stack.last().is_some_and(ElemRef::is_empty_leaf) {
            self.step_forward()?;
        }
        Ok(())
    }

    fn skip_empty_backward(&mut self) -> Result<()> {
        while self.stack.last().is_some_and(ElemRef::is_empty_leaf) {
            self.step_back()?;
        }
        Ok(())
    }

    /// Descend from the top of the stack to a leaf, taking first children
    fn descend_first(&mut self) -> Result<()> {
        while let Some(child) = self.branch_child()? {
            let page = self.read_child(child)?;
            self.stack.push(ElemRef { page, index: 0 });
        }
        Ok(())
    }

    /// Descend from the top of the stack to a leaf, taking last children
    fn descend_last(&mut self) -> Result<()> {
        while let Some(child) = self.branch_child()? {
            let page = self.read_child(child)?;
            let index = page.count().saturating_sub(1);
            self.stack.push(ElemRef { page, index });
        }
        Ok(())
    }

    /// Child page under the top element, if the top is a branch
    fn branch_child(&self) -> Result<Option<u64>> {
        match self.stack.last() {
            Some(top) if top.page.is_branch() => Ok(Some(top.page.branch_element(top.index)?.pgid)),
            _ => Ok(None),
        }
    }

    // =========================================================================
    // Access
    // =========================================================================

    fn current(&self) -> Result<Option<Item>> {
        Ok(self.current_raw()?.map(|(key, value, flags)| {
            let value = (flags & BUCKET_LEAF_FLAG == 0).then_some(value);
            (key, value)
        }))
    }

    fn current_raw(&self) -> Result<Option<RawItem>> {
        let Some(top) = self.stack.last() else {
            return Ok(None);
        };
        if top.index >= top.page.count() {
            return Ok(None);
        }
        let elem = top.page.leaf_element(top.index)?;
        Ok(Some((elem.key.to_vec(), elem.value.to_vec(), elem.flags)))
    }

    fn root_page(&self) -> Result<Page> {
        match &self.root {
            Root::Page(id) => self.read_node(*id),
            Root::Inline(page) => Ok(page.clone()),
        }
    }

    /// Read the child of the top of the stack
    ///
    /// A child already on the path, or a path deeper than any real tree,
    /// means the branch pages point in a cycle.
    fn read_child(&self, id: u64) -> Result<Page> {
        if self.stack.iter().any(|elem| elem.page.id() == id) {
            return Err(DumpError::Corrupt(format!(
                "page {} revisited while descending",
                id
            )));
        }
        if self.stack.len() >= MAX_DEPTH {
            return Err(DumpError::Corrupt(format!(
                "tree deeper than {} levels at page {}",
                MAX_DEPTH, id
            )));
        }
        self.read_node(id)
    }

    fn read_node(&self, id: u64) -> Result<Page> {
        let page = self.db.read_page(id)?;
        page.ensure_node()?;
        Ok(page)
    }
}

/// Index of the first element with key `>= target` (`count` if none)
fn lower_bound(page: &Page, target: &[u8]) -> Result<usize> {
    let (mut lo, mut hi) = (0, page.count());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if page.key_at(mid)? < target {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}
