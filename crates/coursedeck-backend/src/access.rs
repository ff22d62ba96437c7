use coursedeck_shared::{Course, User, UserRole};
use uuid::Uuid;

use crate::error::AppError;

/// The authenticated user a store operation runs on behalf of.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub role: UserRole,
    pub can_upload: bool,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            role: user.role,
            can_upload: user.can_upload,
        }
    }
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn can_create_courses(&self) -> bool {
        self.is_admin() || self.can_upload
    }

    /// Authors manage their own courses; admins manage every course.
    pub fn can_edit(&self, course: &Course) -> bool {
        self.is_admin() || course.author == self.id
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if !self.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(())
    }

    pub fn require_course_creation(&self) -> Result<(), AppError> {
        if !self.can_create_courses() {
            return Err(AppError::Forbidden);
        }
        Ok(())
    }

    pub fn require_edit(&self, course: &Course) -> Result<(), AppError> {
        if !self.can_edit(course) {
            return Err(AppError::Forbidden);
        }
        Ok(())
    }
}
