//! All-or-nothing ownership transfer.
//!
//! Every endpoint touched by a post is locked (ascending serial order), the
//! whole list is validated, and only then is anything mutated. A rejected
//! transfer leaves every port exactly as it was.

use std::sync::Arc;

use parking_lot::MutexGuard;
use smallvec::SmallVec;
use tracing::trace;

use crate::endpoint::{Endpoint, EndpointInner};
use crate::error::{PortError, PortResult, StateViolation};
use crate::hub::HubShared;
use crate::port::{MessagePort, PortState, TransferList};

type Locked<'a> = SmallVec<[(u64, MutexGuard<'a, EndpointInner>); 4]>;

/// Validates and commits a transfer.
///
/// With a `source`, the source must be usable for sending and becomes
/// `Started`. Without one (window posts from the embedder) only the transfer
/// list is checked. Returns fresh handles for the moved ports.
pub(crate) fn commit(
    hub: &HubShared,
    source: Option<&MessagePort>,
    transfer: &[MessagePort],
) -> PortResult<TransferList> {
    check_identities(source, transfer)?;
    if source.is_none() && transfer.is_empty() {
        return Ok(TransferList::new());
    }

    let mut endpoints: SmallVec<[&Arc<Endpoint>; 4]> = source
        .into_iter()
        .chain(transfer)
        .map(MessagePort::endpoint)
        .collect();
    endpoints.sort_by_key(|endpoint| endpoint.serial());
    endpoints.dedup_by_key(|endpoint| endpoint.serial());
    let mut locked: Locked<'_> = endpoints
        .iter()
        .map(|endpoint| (endpoint.serial(), endpoint.lock()))
        .collect();

    if let Some(source) = source {
        match slot(&mut locked, source).state_for(source.id()) {
            PortState::Transferred => {
                return Err(violation(source, StateViolation::AlreadyTransferred));
            }
            PortState::Closed => return Err(violation(source, StateViolation::AlreadyClosed)),
            PortState::Pending | PortState::Started => {}
        }
    }
    for port in transfer {
        let rejected = match slot(&mut locked, port).state_for(port.id()) {
            PortState::Pending => None,
            PortState::Started => Some(StateViolation::AlreadyStarted),
            PortState::Transferred => Some(StateViolation::AlreadyTransferred),
            PortState::Closed => Some(StateViolation::AlreadyClosed),
        };
        if let Some(rejected) = rejected {
            trace!(port = %port.id(), %rejected, "transfer rejected");
            return Err(violation(port, rejected));
        }
    }

    if let Some(source) = source {
        let inner = slot(&mut locked, source);
        if inner.state == PortState::Pending {
            inner.state = PortState::Started;
        }
    }
    let mut moved = TransferList::new();
    for port in transfer {
        let successor = hub.next_port_id();
        slot(&mut locked, port).owner = successor;
        trace!(from = %port.id(), to = %successor, "port transferred");
        moved.push(MessagePort::from_parts(successor, Arc::clone(port.endpoint())));
    }
    Ok(moved)
}

fn check_identities(source: Option<&MessagePort>, transfer: &[MessagePort]) -> PortResult<()> {
    for (index, port) in transfer.iter().enumerate() {
        if source.is_some_and(|source| source.id() == port.id()) {
            return Err(violation(port, StateViolation::TransferSelf));
        }
        if transfer[..index].iter().any(|earlier| earlier.id() == port.id()) {
            return Err(violation(port, StateViolation::DuplicateTransfer));
        }
    }
    Ok(())
}

fn slot<'g, 'a>(locked: &'g mut Locked<'a>, port: &MessagePort) -> &'g mut EndpointInner {
    let serial = port.endpoint().serial();
    // Every port passed to `commit` was locked above, so the search always hits.
    let index = locked
        .binary_search_by_key(&serial, |(serial, _)| *serial)
        .unwrap_or_else(|insert_at| insert_at);
    &mut locked[index].1
}

fn violation(port: &MessagePort, violation: StateViolation) -> PortError {
    PortError::invalid_state(port.id(), violation)
}
