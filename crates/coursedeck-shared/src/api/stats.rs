use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseStats {
    pub total_users: i64,
    pub total_courses: usize,
    pub total_contents: usize,
    pub contents_by_type: BTreeMap<String, usize>,
    pub public_courses: usize,
    pub private_courses: usize,
}
