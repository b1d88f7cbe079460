use async_trait::async_trait;

use crate::error::{AppError, Result, StorageError};

use super::{arg, AppState, Handler};

pub struct Login;

#[async_trait]
impl Handler for Login {
    async fn handle(&self, state: &mut AppState, args: &[String]) -> Result<()> {
        let name = arg(args, 0, "login <username>")?;

        if state.repository.get_user(name).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "User {name} does not exist, register it first"
            )));
        }

        state.config.set_user(name)?;
        println!("User has been set to: {name}");
        Ok(())
    }
}

pub struct Register;

#[async_trait]
impl Handler for Register {
    async fn handle(&self, state: &mut AppState, args: &[String]) -> Result<()> {
        let name = arg(args, 0, "register <username>")?;

        let user = match state.repository.create_user(name).await {
            Ok(user) => user,
            Err(StorageError::ConstraintViolation(_)) => {
                return Err(AppError::Other(format!("User {name} already exists")));
            }
            Err(e) => return Err(e.into()),
        };
        tracing::debug!("Registered user {} with id {}", user.name, user.id);

        state.config.set_user(&user.name)?;
        println!("User {} has been added and set as current", user.name);
        Ok(())
    }
}

/// Deletes every user and, through cascades, all feeds, follows and posts.
pub struct Reset;

#[async_trait]
impl Handler for Reset {
    async fn handle(&self, state: &mut AppState, _args: &[String]) -> Result<()> {
        let deleted = state.repository.delete_users().await?;
        println!("Removed {deleted} user(s) and everything they owned");
        Ok(())
    }
}

pub struct ListUsers;

#[async_trait]
impl Handler for ListUsers {
    async fn handle(&self, state: &mut AppState, _args: &[String]) -> Result<()> {
        let current = state.config.current_user_name.as_deref();
        for name in state.repository.list_users().await? {
            if Some(name.as_str()) == current {
                println!("* {name} (current)");
            } else {
                println!("* {name}");
            }
        }
        Ok(())
    }
}
