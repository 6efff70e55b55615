//! Roster repository: parents, students, coaches and staff.
//!
//! # Responsibility
//! - Resolve subject ids for the ledger and the register.
//! - Provide the active-student listing used by batch fee generation.

use crate::model::attendance::SubjectKind;
use crate::model::roster::{Member, Parent, Student};
use crate::model::PersonId;
use crate::repo::{bool_to_int, parse_bool, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const STUDENT_SELECT_SQL: &str = "SELECT id, name, parent_id, is_active FROM students";

pub trait RosterRepository {
    fn create_parent(&self, parent: &Parent) -> RepoResult<PersonId>;
    fn create_student(&self, student: &Student) -> RepoResult<PersonId>;
    /// Creates a coach or staff member. Students go through `create_student`.
    fn create_member(&self, kind: SubjectKind, member: &Member) -> RepoResult<PersonId>;
    fn get_student(&self, id: PersonId) -> RepoResult<Option<Student>>;
    fn set_student_active(&self, id: PersonId, is_active: bool) -> RepoResult<()>;
    fn list_active_students(&self) -> RepoResult<Vec<Student>>;
    fn subject_exists(&self, kind: SubjectKind, id: PersonId) -> RepoResult<bool>;
}

pub struct SqliteRosterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRosterRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RosterRepository for SqliteRosterRepository<'_> {
    fn create_parent(&self, parent: &Parent) -> RepoResult<PersonId> {
        self.conn.execute(
            "INSERT INTO parents (id, name, email) VALUES (?1, ?2, ?3);",
            params![
                parent.id.to_string(),
                parent.name.as_str(),
                parent.email.as_deref()
            ],
        )?;
        Ok(parent.id)
    }

    fn create_student(&self, student: &Student) -> RepoResult<PersonId> {
        if !row_exists(self.conn, "parents", student.parent_id)? {
            return Err(RepoError::NotFound {
                entity: "parent",
                id: student.parent_id,
            });
        }

        self.conn.execute(
            "INSERT INTO students (id, name, parent_id, is_active) VALUES (?1, ?2, ?3, ?4);",
            params![
                student.id.to_string(),
                student.name.as_str(),
                student.parent_id.to_string(),
                bool_to_int(student.is_active),
            ],
        )?;
        Ok(student.id)
    }

    fn create_member(&self, kind: SubjectKind, member: &Member) -> RepoResult<PersonId> {
        let table = match kind {
            SubjectKind::Coach => "coaches",
            SubjectKind::Staff => "staff",
            SubjectKind::Student => {
                return Err(RepoError::InvalidData(
                    "students must be created with a parent link".to_string(),
                ))
            }
        };

        self.conn.execute(
            &format!("INSERT INTO {table} (id, name) VALUES (?1, ?2);"),
            params![member.id.to_string(), member.name.as_str()],
        )?;
        Ok(member.id)
    }

    fn get_student(&self, id: PersonId) -> RepoResult<Option<Student>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{STUDENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_student_row(row)?));
        }
        Ok(None)
    }

    fn set_student_active(&self, id: PersonId, is_active: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE students SET is_active = ?1 WHERE id = ?2;",
            params![bool_to_int(is_active), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "student",
                id,
            });
        }
        Ok(())
    }

    fn list_active_students(&self) -> RepoResult<Vec<Student>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STUDENT_SELECT_SQL} WHERE is_active = 1 ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut students = Vec::new();
        while let Some(row) = rows.next()? {
            students.push(parse_student_row(row)?);
        }
        Ok(students)
    }

    fn subject_exists(&self, kind: SubjectKind, id: PersonId) -> RepoResult<bool> {
        let table = match kind {
            SubjectKind::Student => "students",
            SubjectKind::Coach => "coaches",
            SubjectKind::Staff => "staff",
        };
        row_exists(self.conn, table, id)
    }
}

fn row_exists(conn: &Connection, table: &str, id: PersonId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1);"),
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_student_row(row: &Row<'_>) -> RepoResult<Student> {
    let id_text: String = row.get("id")?;
    let parent_text: String = row.get("parent_id")?;
    Ok(Student {
        id: parse_uuid(&id_text, "students.id")?,
        name: row.get("name")?,
        parent_id: parse_uuid(&parent_text, "students.parent_id")?,
        is_active: parse_bool(row.get("is_active")?, "students.is_active")?,
    })
}
