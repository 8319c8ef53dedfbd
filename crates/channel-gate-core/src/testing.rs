//! Testing helpers and mock utilities.
//!
//! Provides convenient constructors for mocked platform interfaces.

use crate::platform::{ChatMemberStatus, MockDeliveryApi, MockMembershipApi, PlatformError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Create a mock membership API whose status lookups replay `sequence`.
///
/// Lookups past the end of the sequence return a transient error. Probe
/// methods are left without expectations so tests can add their own.
#[must_use]
pub fn mock_status_sequence(
    sequence: Vec<Result<ChatMemberStatus, PlatformError>>,
) -> MockMembershipApi {
    let queue = Arc::new(Mutex::new(VecDeque::from(sequence)));
    let mut mock = MockMembershipApi::new();
    mock.expect_get_chat_member_status().returning(move |_| {
        queue
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Err(PlatformError::Transient("sequence exhausted".into())))
    });
    mock
}

/// Create a mock membership API that always reports `status`.
#[must_use]
pub fn mock_fixed_status(status: ChatMemberStatus) -> MockMembershipApi {
    let mut mock = MockMembershipApi::new();
    mock.expect_get_chat_member_status()
        .returning(move |_| Ok(status));
    mock
}

/// Create a mock delivery API that accepts every call.
///
/// `send_notice` returns message id `1`.
#[must_use]
pub fn mock_delivery_noop() -> MockDeliveryApi {
    let mut mock = MockDeliveryApi::new();
    mock.expect_send_media().returning(|_, _, _| Ok(()));
    mock.expect_send_notice().returning(|_, _| Ok(1));
    mock.expect_edit_notice().returning(|_, _, _| Ok(()));
    mock
}
