use async_trait::async_trait;
use sqlx::Row;

use timecard_core::domain::employee::{Employee, EmployeeId, Role};
use timecard_core::store::{EmployeeStore, StoreError};

use super::{decode_failure, map_sqlx};
use crate::DbPool;

pub struct SqlEmployeeStore {
    pool: DbPool,
}

impl SqlEmployeeStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_role(s: &str) -> Role {
    match s {
        "manager" => Role::Manager,
        "admin" => Role::Admin,
        _ => Role::Employee,
    }
}

fn row_to_employee(row: &sqlx::sqlite::SqliteRow) -> Result<Employee, StoreError> {
    let id: String = row.try_get("id").map_err(decode_failure)?;
    let name: String = row.try_get("name").map_err(decode_failure)?;
    let email: String = row.try_get("email").map_err(decode_failure)?;
    let role: String = row.try_get("role").map_err(decode_failure)?;
    let active: i64 = row.try_get("active").map_err(decode_failure)?;

    Ok(Employee {
        id: EmployeeId(id),
        name,
        email,
        role: parse_role(&role),
        active: active != 0,
    })
}

#[async_trait]
impl EmployeeStore for SqlEmployeeStore {
    async fn find_by_id(&self, id: &EmployeeId) -> Result<Option<Employee>, StoreError> {
        let row = sqlx::query("SELECT id, name, email, role, active FROM employees WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        match row {
            Some(ref r) => Ok(Some(row_to_employee(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Employee>, StoreError> {
        let row =
            sqlx::query("SELECT id, name, email, role, active FROM employees WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;

        match row {
            Some(ref r) => Ok(Some(row_to_employee(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, employee: Employee) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO employees (id, name, email, role, active)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 role = excluded.role,
                 active = excluded.active",
        )
        .bind(&employee.id.0)
        .bind(&employee.name)
        .bind(&employee.email)
        .bind(employee.role.as_str())
        .bind(i64::from(employee.active))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }
}
