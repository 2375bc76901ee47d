/// Assert that two worlds hold the same value for a property of an entity
#[macro_export]
macro_rules! assert_property_replicated {
    ($source:expr, $target:expr, $entity:expr, $index:expr) => {
        assert_eq!(
            $source.world.property($entity, $index),
            $target.world.property($entity, $index),
            "Property {} of entity {:?} did not replicate",
            $index,
            $entity
        );
    };
}

/// Assert that a peer was disconnected for a protocol violation matching a pattern
#[macro_export]
macro_rules! assert_violation {
    ($peer:expr, $pattern:pat) => {
        assert!(
            $peer.is_disconnected(),
            "Peer should have been disconnected"
        );
        assert!(
            matches!($peer.listener.last_violation(), Some($pattern)),
            "Unexpected violation: {:?}",
            $peer.listener.last_violation()
        );
    };
}
