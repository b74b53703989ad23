//! Detection of sensitive substrings.
//!
//! This module provides the pattern catalog and the classifier built on it:
//!
//! - **Catalog**: named regex rules grouped into toggleable categories (API
//!   keys, tokens, emails, phones, cards, SSNs).
//!
//! - **Classifier**: applies the enabled rules with category-specific length
//!   and shape heuristics, and resolves overlapping matches.
//!
//! # Example
//!
//! ```
//! use passblur::detection::{Category, Classifier, DetectionFilterSet};
//!
//! let classifier = Classifier::with_filters(DetectionFilterSet::only(&[Category::Emails]));
//!
//! let text = "contact me at a@b.com or 555-123-4567";
//! let detections = classifier.find_all(text);
//!
//! assert_eq!(detections.len(), 1);
//! assert_eq!(detections[0].matched(text), "a@b.com");
//! ```

mod catalog;
mod classifier;

pub use catalog::{
    builtin_rules, Category, DetectionFilterSet, DetectionRule, GENERIC_SECRET_MIN_LENGTH,
    PERSONAL_DATA_MIN_LENGTH,
};
pub use classifier::{Classifier, Detection, FieldHints};
