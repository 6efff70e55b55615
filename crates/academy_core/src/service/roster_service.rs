//! Roster maintenance service.

use crate::error::{CoreError, CoreResult};
use crate::model::attendance::SubjectKind;
use crate::model::roster::{Member, Parent, Student};
use crate::model::PersonId;
use crate::repo::roster_repo::RosterRepository;
use crate::repo::RepoError;
use log::info;

pub struct RosterService<R: RosterRepository> {
    repo: R,
}

impl<R: RosterRepository> RosterService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn add_parent(
        &self,
        name: impl Into<String>,
        email: Option<String>,
    ) -> CoreResult<Parent> {
        let parent = Parent::new(require_name(name)?, email);
        self.repo.create_parent(&parent)?;
        info!("event=roster_add module=roster status=ok kind=parent id={}", parent.id);
        Ok(parent)
    }

    pub fn add_student(&self, name: impl Into<String>, parent_id: PersonId) -> CoreResult<Student> {
        let student = Student::new(require_name(name)?, parent_id);
        self.repo
            .create_student(&student)
            .map_err(|err| match err {
                RepoError::NotFound { id, .. } => {
                    CoreError::InvalidInput(format!("parent {id} does not exist"))
                }
                other => CoreError::Repo(other),
            })?;
        info!("event=roster_add module=roster status=ok kind=student id={}", student.id);
        Ok(student)
    }

    /// Adds a coach or staff member.
    pub fn add_member(&self, kind: SubjectKind, name: impl Into<String>) -> CoreResult<Member> {
        if kind == SubjectKind::Student {
            return Err(CoreError::InvalidInput(
                "students are added with a parent".to_string(),
            ));
        }
        let member = Member::new(require_name(name)?);
        self.repo.create_member(kind, &member)?;
        info!(
            "event=roster_add module=roster status=ok kind={} id={}",
            kind.as_str(),
            member.id
        );
        Ok(member)
    }

    /// Inactive students are skipped by batch fee generation.
    pub fn set_student_active(&self, student_id: PersonId, is_active: bool) -> CoreResult<()> {
        self.repo
            .set_student_active(student_id, is_active)
            .map_err(|err| match err {
                RepoError::NotFound { .. } => CoreError::StudentNotFound(student_id),
                other => CoreError::Repo(other),
            })
    }

    pub fn get_student(&self, student_id: PersonId) -> CoreResult<Student> {
        self.repo
            .get_student(student_id)?
            .ok_or(CoreError::StudentNotFound(student_id))
    }
}

fn require_name(name: impl Into<String>) -> CoreResult<String> {
    let name = name.into();
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput("name must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}
