//! Priority ordering of syscall entries
//!
//! Builds a singly linked list sorted by descending priority by inserting
//! each entry behind every entry whose priority is greater or equal, which
//! keeps entries of equal priority in their input order. Filters hold tens
//! to low hundreds of syscalls, so the linear scan per insertion is fine.

use std::collections::TryReserveError;

use crate::db::SyscallEntry;

struct Link<'a> {
    sys: &'a SyscallEntry,
    next: Option<usize>,
}

/// Transient ordering of a database's syscall entries
///
/// Borrows the entries; dropping the list releases every link.
pub struct PriorityList<'a> {
    links: Vec<Link<'a>>,
    head: Option<usize>,
}

impl<'a> PriorityList<'a> {
    /// Order `entries` by descending priority, keeping ties in input order
    ///
    /// Link storage is reserved before anything is linked; if that fails no
    /// partial list exists and the allocation error is returned.
    pub fn build(entries: &'a [SyscallEntry]) -> Result<Self, TryReserveError> {
        let mut links = Vec::new();
        links.try_reserve_exact(entries.len())?;

        let mut list = Self { links, head: None };
        for sys in entries {
            list.insert(sys);
        }
        Ok(list)
    }

    fn insert(&mut self, sys: &'a SyscallEntry) {
        let new = self.links.len();
        let mut prev: Option<usize> = None;
        let mut iter = self.head;

        while let Some(idx) = iter {
            if self.links[idx].sys.priority < sys.priority {
                break;
            }
            prev = Some(idx);
            iter = self.links[idx].next;
        }

        self.links.push(Link { sys, next: iter });
        match prev {
            None => self.head = Some(new),
            Some(prev) => self.links[prev].next = Some(new),
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, 'a> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }
}

impl<'l, 'a> IntoIterator for &'l PriorityList<'a> {
    type Item = &'a SyscallEntry;
    type IntoIter = Iter<'l, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Walks a [`PriorityList`] from highest to lowest priority
pub struct Iter<'l, 'a> {
    list: &'l PriorityList<'a>,
    cursor: Option<usize>,
}

impl<'l, 'a> Iterator for Iter<'l, 'a> {
    type Item = &'a SyscallEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let list = self.list;
        let link = &list.links[self.cursor?];
        self.cursor = link.next;
        Some(link.sys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;

    fn entry(num: i32, priority: i32) -> SyscallEntry {
        SyscallEntry::new(num, priority, Action::Allow)
    }

    fn order(entries: &[SyscallEntry]) -> Vec<i32> {
        let list = PriorityList::build(entries).unwrap();
        list.iter().map(|sys| sys.num).collect()
    }

    #[test]
    fn test_empty() {
        let list = PriorityList::build(&[]).unwrap();
        assert!(list.is_empty());
        assert_eq!(list.iter().count(), 0);
    }

    #[test]
    fn test_descending_priority() {
        let entries = [entry(1, 0), entry(2, 20), entry(3, -5), entry(4, 10)];
        assert_eq!(order(&entries), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_equal_priorities_keep_input_order() {
        // (A,5), (B,5), (C,9) -> C, A, B
        let entries = [entry(100, 5), entry(200, 5), entry(300, 9)];
        assert_eq!(order(&entries), vec![300, 100, 200]);
    }

    #[test]
    fn test_all_equal() {
        let entries: Vec<_> = (0..10).map(|n| entry(n, 1)).collect();
        assert_eq!(order(&entries), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_ascending_input_reversed() {
        let entries: Vec<_> = (0..6).map(|n| entry(n, n)).collect();
        assert_eq!(order(&entries), vec![5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_len_matches_input() {
        let entries = [entry(1, 1), entry(2, 2)];
        let list = PriorityList::build(&entries).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!((&list).into_iter().count(), 2);
    }
}
