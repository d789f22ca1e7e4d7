//! Support tickets and their ordered response threads.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use super::{Store, UnknownVariant, new_id, store_err};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in-progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "in-progress" => Ok(TicketStatus::InProgress),
            "resolved" => Ok(TicketStatus::Resolved),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(UnknownVariant { kind: "ticket status", value: other.to_string() }),
        }
    }
}

text_enum_sql!(TicketStatus);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    pub message: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub subject: String,
    pub message: String,
    pub email: String,
    pub status: TicketStatus,
    pub responses: Vec<TicketResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<SupportTicket> {
    Ok(SupportTicket {
        id: row.get(0)?,
        user_id: row.get(1)?,
        subject: row.get(2)?,
        message: row.get(3)?,
        email: row.get(4)?,
        status: row.get(5)?,
        responses: Vec::new(),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const TICKET_COLUMNS: &str = "id, user_id, subject, message, email, status, created_at, updated_at";

fn load_responses(conn: &Connection, ticket: &mut SupportTicket) -> Result<(), AppError> {
    let mut stmt = conn
        .prepare(
            "SELECT message, is_admin, created_at FROM ticket_responses \
             WHERE ticket_id = ?1 ORDER BY seq ASC",
        )
        .map_err(store_err("prepare load responses"))?;
    let rows = stmt
        .query_map(params![ticket.id], |row| {
            Ok(TicketResponse {
                message: row.get(0)?,
                is_admin: row.get(1)?,
                created_at: row.get(2)?,
            })
        })
        .map_err(store_err("query responses"))?;
    ticket.responses = rows
        .collect::<Result<Vec<_>, _>>()
        .map_err(store_err("read response row"))?;
    Ok(())
}

fn find_ticket_in(conn: &Connection, id: &str) -> Result<Option<SupportTicket>, AppError> {
    let ticket = conn
        .query_row(
            &format!("SELECT {TICKET_COLUMNS} FROM support_tickets WHERE id = ?1"),
            params![id],
            ticket_from_row,
        )
        .optional()
        .map_err(store_err("find ticket"))?;
    match ticket {
        Some(mut t) => {
            load_responses(conn, &mut t)?;
            Ok(Some(t))
        }
        None => Ok(None),
    }
}

impl Store {
    pub fn create_ticket(
        &self,
        user_id: &str,
        subject: &str,
        message: &str,
        email: &str,
    ) -> Result<SupportTicket, AppError> {
        let conn = self.conn()?;
        let now = Utc::now();
        let ticket = SupportTicket {
            id: new_id(),
            user_id: user_id.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
            email: email.to_string(),
            status: TicketStatus::Open,
            responses: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        conn.execute(
            &format!("INSERT INTO support_tickets ({TICKET_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)"),
            params![
                ticket.id,
                ticket.user_id,
                ticket.subject,
                ticket.message,
                ticket.email,
                ticket.status,
                now,
            ],
        )
        .map_err(store_err("insert ticket"))?;
        Ok(ticket)
    }

    /// Tickets of `user_id`, newest first, with their responses.
    pub fn list_tickets(&self, user_id: &str) -> Result<Vec<SupportTicket>, AppError> {
        let conn = self.conn()?;
        let mut tickets = {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {TICKET_COLUMNS} FROM support_tickets WHERE user_id = ?1 \
                     ORDER BY created_at DESC, rowid DESC"
                ))
                .map_err(store_err("prepare list tickets"))?;
            let rows = stmt
                .query_map(params![user_id], ticket_from_row)
                .map_err(store_err("query tickets"))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(store_err("read ticket row"))?
        };
        for ticket in &mut tickets {
            load_responses(&conn, ticket)?;
        }
        Ok(tickets)
    }

    pub fn find_ticket(&self, id: &str) -> Result<Option<SupportTicket>, AppError> {
        let conn = self.conn()?;
        find_ticket_in(&conn, id)
    }

    /// Append a response; a closed ticket goes back to open. Returns the
    /// updated ticket, or `None` if it does not exist.
    pub fn append_response(
        &self,
        ticket_id: &str,
        message: &str,
        is_admin: bool,
    ) -> Result<Option<SupportTicket>, AppError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(store_err("begin append response"))?;
        let now = Utc::now();

        let changed = tx
            .execute(
                "UPDATE support_tickets \
                 SET status = CASE WHEN status = 'closed' THEN 'open' ELSE status END, \
                     updated_at = ?2 \
                 WHERE id = ?1",
                params![ticket_id, now],
            )
            .map_err(store_err("touch ticket"))?;
        if changed == 0 {
            return Ok(None);
        }
        tx.execute(
            "INSERT INTO ticket_responses (ticket_id, message, is_admin, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![ticket_id, message, is_admin, now],
        )
        .map_err(store_err("insert response"))?;
        tx.commit().map_err(store_err("commit append response"))?;

        find_ticket_in(&conn, ticket_id)
    }

    pub fn set_ticket_status(
        &self,
        ticket_id: &str,
        status: TicketStatus,
    ) -> Result<Option<SupportTicket>, AppError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE support_tickets SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![ticket_id, status, Utc::now()],
            )
            .map_err(store_err("update ticket status"))?;
        if changed == 0 {
            return Ok(None);
        }
        find_ticket_in(&conn, ticket_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing;

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&TicketStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        assert_eq!("resolved".parse::<TicketStatus>().unwrap(), TicketStatus::Resolved);
        assert!("pending".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn create_and_list_newest_first() {
        let (_tmp, store) = testing::store();
        let uid = testing::user(&store, "s@x.io");
        let first = store.create_ticket(&uid, "One", "m1", "s@x.io").unwrap();
        let second = store.create_ticket(&uid, "Two", "m2", "s@x.io").unwrap();

        let listed = store.list_tickets(&uid).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
        assert_eq!(listed[0].status, TicketStatus::Open);
    }

    #[test]
    fn responses_append_in_order() {
        let (_tmp, store) = testing::store();
        let uid = testing::user(&store, "r@x.io");
        let ticket = store.create_ticket(&uid, "Help", "stuck", "r@x.io").unwrap();

        store.append_response(&ticket.id, "first", false).unwrap();
        let updated = store.append_response(&ticket.id, "second", true).unwrap().unwrap();
        let messages: Vec<_> = updated.responses.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert!(updated.responses[1].is_admin);
    }

    #[test]
    fn response_reopens_closed_ticket_only() {
        let (_tmp, store) = testing::store();
        let uid = testing::user(&store, "c@x.io");
        let ticket = store.create_ticket(&uid, "Help", "stuck", "c@x.io").unwrap();

        store.set_ticket_status(&ticket.id, TicketStatus::Closed).unwrap();
        let reopened = store.append_response(&ticket.id, "again", false).unwrap().unwrap();
        assert_eq!(reopened.status, TicketStatus::Open);

        store.set_ticket_status(&ticket.id, TicketStatus::Resolved).unwrap();
        let resolved = store.append_response(&ticket.id, "thanks", false).unwrap().unwrap();
        assert_eq!(resolved.status, TicketStatus::Resolved);
    }

    #[test]
    fn missing_ticket_yields_none() {
        let (_tmp, store) = testing::store();
        assert!(store.find_ticket("nope").unwrap().is_none());
        assert!(store.append_response("nope", "x", false).unwrap().is_none());
        assert!(store.set_ticket_status("nope", TicketStatus::Closed).unwrap().is_none());
    }
}
