//! Value object trait: equality by value, not identity.
//!
//! Addresses, discount terms and sequence numbers carry no identity of their
//! own. Two of them with the same attributes are the same value.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attributes:
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct PostalAddress {
///     post_code: String,
///     post_office: String,
/// }
///
/// impl ValueObject for PostalAddress {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
