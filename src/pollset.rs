//! Intrusive poll-set engine over handle-table indices.
//!
//! Each multiplexer file owns the head/tail of its own doubly linked list;
//! member files carry (owner, prev, next) back-references as arena indices.
//! Insertion is at the head, so traversal order is most-recently-added first;
//! `modify` never repositions a member.
//!
//! Mutation must not overlap an in-progress traversal of the same list; the
//! wait path snapshots membership before consuming input for this reason.

use crate::error::SysError;
use crate::events::EventMask;
use crate::file::{FileKind, PollLink};
use crate::handles::{Fd, HandleTable, MAX_HANDLES};

/// Resolve `epfd` to a live multiplexer file or fail.
fn ensure_epoll(table: &HandleTable, epfd: Fd) -> Result<(), SysError> {
    let file = table.lookup(epfd).ok_or(SysError::BadHandle)?;
    if file.kind() != FileKind::Epoll {
        return Err(SysError::NotAnEpoll);
    }
    Ok(())
}

/// Insert `fd` at the head of `epfd`'s poll-set.
///
/// The stored interest is `mask | IMPLICIT_INTEREST`: every registered file
/// polls for error/hangup. A file may belong to at most one poll-set;
/// registering a linked file fails with `AlreadyRegistered` (EEXIST). O(1).
pub fn register(
    table: &mut HandleTable,
    epfd: Fd,
    fd: Fd,
    mask: EventMask,
    token: u64,
) -> Result<(), SysError> {
    ensure_epoll(table, epfd)?;

    let old_head = table
        .lookup(epfd)
        .and_then(|f| f.epoll_state())
        .and_then(|s| s.head);

    {
        let file = table.lookup_mut(fd).ok_or(SysError::BadHandle)?;
        if file.link.is_some() {
            return Err(SysError::AlreadyRegistered);
        }
        file.interest = mask | EventMask::IMPLICIT_INTEREST;
        file.token = token;
        file.link = Some(PollLink {
            owner: epfd,
            prev: None,
            next: old_head,
        });
    }

    if let Some(head) = old_head {
        if let Some(link) = table.lookup_mut(head).and_then(|f| f.link.as_mut()) {
            link.prev = Some(fd);
        }
    }

    if let Some(state) = table.lookup_mut(epfd).and_then(|f| f.epoll_state_mut()) {
        state.head = Some(fd);
        if old_head.is_none() {
            state.tail = Some(fd);
        }
    }
    Ok(())
}

/// Replace a member's interest mask and token in place.
///
/// List position is unchanged. Fails with `NotRegistered` (ENOENT) when `fd`
/// is not a member of `epfd`'s set. O(1).
pub fn modify(
    table: &mut HandleTable,
    epfd: Fd,
    fd: Fd,
    mask: EventMask,
    token: u64,
) -> Result<(), SysError> {
    ensure_epoll(table, epfd)?;
    let file = table.lookup_mut(fd).ok_or(SysError::BadHandle)?;
    match file.link {
        Some(link) if link.owner == epfd => {
            file.interest = mask | EventMask::IMPLICIT_INTEREST;
            file.token = token;
            Ok(())
        }
        _ => Err(SysError::NotRegistered),
    }
}

/// Unlink `fd` from `epfd`'s poll-set and clear its link. O(1).
pub fn unregister(table: &mut HandleTable, epfd: Fd, fd: Fd) -> Result<(), SysError> {
    ensure_epoll(table, epfd)?;

    let link = {
        let file = table.lookup_mut(fd).ok_or(SysError::BadHandle)?;
        match file.link {
            Some(link) if link.owner == epfd => {
                file.link = None;
                link
            }
            _ => return Err(SysError::NotRegistered),
        }
    };

    match link.prev {
        Some(prev) => {
            if let Some(l) = table.lookup_mut(prev).and_then(|f| f.link.as_mut()) {
                l.next = link.next;
            }
        }
        None => {
            if let Some(s) = table.lookup_mut(epfd).and_then(|f| f.epoll_state_mut()) {
                s.head = link.next;
            }
        }
    }
    match link.next {
        Some(next) => {
            if let Some(l) = table.lookup_mut(next).and_then(|f| f.link.as_mut()) {
                l.prev = link.prev;
            }
        }
        None => {
            if let Some(s) = table.lookup_mut(epfd).and_then(|f| f.epoll_state_mut()) {
                s.tail = link.prev;
            }
        }
    }
    Ok(())
}

/// Snapshot `epfd`'s membership, head to tail.
///
/// The walk is bounded by the table capacity so a corrupted list can never
/// hang the simulator.
pub fn members(table: &HandleTable, epfd: Fd) -> Result<Vec<Fd>, SysError> {
    ensure_epoll(table, epfd)?;
    let mut out = Vec::new();
    let mut cursor = table
        .lookup(epfd)
        .and_then(|f| f.epoll_state())
        .and_then(|s| s.head);
    while let Some(fd) = cursor {
        if out.len() > MAX_HANDLES {
            debug_assert!(false, "poll-set longer than handle table");
            break;
        }
        out.push(fd);
        cursor = table.lookup(fd).and_then(|f| f.link).and_then(|l| l.next);
    }
    Ok(out)
}

/// Clear every member's link and empty the list.
///
/// Used when the multiplexer handle itself is closed, so no member keeps a
/// back-reference to a released slot.
pub fn unlink_all(table: &mut HandleTable, epfd: Fd) -> Result<(), SysError> {
    let fds = members(table, epfd)?;
    for fd in fds {
        if let Some(file) = table.lookup_mut(fd) {
            file.link = None;
        }
    }
    if let Some(state) = table.lookup_mut(epfd).and_then(|f| f.epoll_state_mut()) {
        state.head = None;
        state.tail = None;
    }
    Ok(())
}
