//! Send/Sync guarantees for the public API.

use asyncfile::{AsyncFile, AsyncFileBuilder, ManualDispatcher, MockOsCalls, ThreadTimer, UnixOsCalls};
use static_assertions::assert_impl_all;

#[test]
fn core_type_is_send_sync() {
    assert_impl_all!(AsyncFile: Send, Sync);
}

#[test]
fn collaborators_are_send_sync() {
    assert_impl_all!(AsyncFileBuilder: Send, Sync);
    assert_impl_all!(ManualDispatcher: Send, Sync);
    assert_impl_all!(ThreadTimer: Send, Sync);
    assert_impl_all!(MockOsCalls: Send, Sync);
    assert_impl_all!(UnixOsCalls: Send, Sync);
}
