/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The ACL policy evaluator is an opaque collaborator (spec.md §1): the
//! engine only ever sees a boolean-ish flag result, never the policy logic
//! itself.

use crate::ids::ContextId;
use crate::messages::IncomingMessage;

bitflags::bitflags! {
    /// Result of evaluating a remote message against the ACL policy
    /// (spec.md §4.1).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct AclChangeFlags: u8 {
        /// The message must be dropped entirely; it never reaches the queue
        /// or the meta buffers.
        const FILTERED = 0b0000_0001;
        /// The policy's internal state changed as a side effect of this
        /// message (e.g. an operator grant/revoke), and the host should be
        /// notified via `acls_changed`.
        const CHANGED = 0b0000_0010;
    }
}

/// Opaque predicate invoked once per incoming remote message (spec.md §4.1).
/// Implementations live entirely outside this crate; the engine treats this
/// as a black box.
pub trait AclPolicy: Send + Sync {
    fn evaluate(&self, origin: ContextId, message: &IncomingMessage) -> AclChangeFlags;
}

/// An [`AclPolicy`] that never filters and never reports a change. Useful
/// for local-only engines and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveAcl;

impl AclPolicy for PermissiveAcl {
    fn evaluate(&self, _origin: ContextId, _message: &IncomingMessage) -> AclChangeFlags {
        AclChangeFlags::empty()
    }
}
