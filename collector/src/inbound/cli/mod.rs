//! Command-line front end.
//!
//! [`Console`] executes one [`Command`] at a time against a
//! [`Collector`] and writes the resulting snapshot as text. The `shell`
//! command keeps one console alive across many commands, which is what makes
//! the open collection and the undo slot useful.

mod args;
mod render;

use std::io::{self, BufRead, Write};

use clap::Parser;
use thiserror::Error;
use tracing::debug;

pub use self::args::{Assignment, CliArgs, Command};
use self::args::{ShellLine, split_words};
use crate::app::Collector;
use crate::domain::{
    COLOR_PALETTE, Collection, CollectionPatch, Error, Field, FieldType, FormState, ICON_PALETTE,
    Item, NewCollectionRequest, SchemaDraft, SortSettings,
};

const SORT_BY_CREATION: &str = "created_at";
const SHELL_PROMPT: &str = "collector> ";

/// Failures reported by the front end.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Domain(#[from] Error),
    #[error("{0}")]
    Usage(String),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl CliError {
    fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}

/// Executes commands and renders their results to `out`.
pub struct Console<W> {
    app: Collector,
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(app: Collector, out: W) -> Self {
        Self { app, out }
    }

    /// Give back the output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Run commands read line by line from `input` until it ends or an
    /// `exit` line. Command failures are printed and the shell continues.
    ///
    /// # Errors
    ///
    /// Only input or output failures end the shell early.
    pub async fn shell<R: BufRead>(&mut self, input: R) -> Result<(), CliError> {
        writeln!(self.out, "Type `help` for commands and `exit` to leave.")?;
        self.prompt()?;
        for line in input.lines() {
            let line = line?;
            let words = match split_words(&line) {
                Ok(words) => words,
                Err(message) => {
                    writeln!(self.out, "error: {message}")?;
                    self.prompt()?;
                    continue;
                }
            };
            match words.first().map(String::as_str) {
                None => {}
                Some("exit" | "quit") => break,
                Some(_) => self.shell_line(&words).await?,
            }
            self.prompt()?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn prompt(&mut self) -> io::Result<()> {
        write!(self.out, "{SHELL_PROMPT}")?;
        self.out.flush()
    }

    async fn shell_line(&mut self, words: &[String]) -> Result<(), CliError> {
        let parsed = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(err) => {
                write!(self.out, "{}", err.render())?;
                return Ok(());
            }
        };
        match self.execute(parsed.command).await {
            Ok(()) => Ok(()),
            Err(CliError::Output(err)) => Err(CliError::Output(err)),
            Err(err) => {
                debug!(error = %err, "shell command failed");
                writeln!(self.out, "error: {err}")?;
                Ok(())
            }
        }
    }

    /// Execute one command.
    ///
    /// # Errors
    ///
    /// Returns validation and backend failures, and usage errors such as an
    /// unknown collection or field.
    pub async fn execute(&mut self, command: Command) -> Result<(), CliError> {
        match command {
            Command::SignUp { email, password } => self.sign_up(&email, &password).await,
            Command::SignIn { email, password } => {
                let user = self.app.auth.sign_in(&email, &password).await?;
                self.app.sync_user().await?;
                writeln!(self.out, "Signed in as {}", render::user_line(&user))?;
                Ok(())
            }
            Command::SignOut => {
                let result = self.app.auth.sign_out().await;
                self.app.sync_user().await?;
                result?;
                writeln!(self.out, "Signed out")?;
                Ok(())
            }
            Command::Whoami => {
                match self.app.auth.current_user() {
                    Some(user) => writeln!(self.out, "{}", render::user_line(&user))?,
                    None => writeln!(self.out, "Not signed in")?,
                }
                Ok(())
            }
            Command::Lists => self.lists().await,
            Command::CreateList {
                name,
                fields,
                color,
                icon,
            } => self.create_list(name, fields, color, icon).await,
            Command::EditList {
                list,
                name,
                add_fields,
                remove_fields,
                color,
                icon,
            } => {
                let edit = ListEdit {
                    name,
                    add_fields,
                    remove_fields,
                    color,
                    icon,
                };
                self.edit_list(&list, edit).await
            }
            Command::Favorite { list } => {
                let collection = self.resolve_collection(&list).await?;
                let updated = self.app.collections.toggle_favorite(&collection.id).await?;
                let state = if updated.is_favorite { "Favourited" } else { "Unfavourited" };
                writeln!(self.out, "{state} {}", updated.name)?;
                Ok(())
            }
            Command::DeleteList { list } => {
                let collection = self.resolve_collection(&list).await?;
                self.app.delete_collection(&collection.id).await?;
                writeln!(self.out, "Deleted {} and its items", collection.name)?;
                Ok(())
            }
            Command::Palette => self.palette(),
            Command::Open { list } => {
                let collection = self.resolve_collection(&list).await?;
                let opened = self.app.open_collection(&collection.id).await?;
                let count = self.app.items.snapshot().items.len();
                writeln!(self.out, "Opened {} ({count} items)", opened.name)?;
                Ok(())
            }
            Command::Items {
                list,
                sort_by,
                order,
                search,
            } => {
                let collection = self.target_collection(list.as_deref(), true).await?;
                if let Some(field) = sort_by {
                    self.app.items.set_sort(sort_settings(&collection, &field, order)?);
                }
                let items = match search.as_deref() {
                    Some(query) => self.app.items.visible_items(query),
                    None => self.app.items.sorted_items(),
                };
                self.print_items(&collection, &items)
            }
            Command::Form { list, item } => {
                let collection = self.target_collection(list.as_deref(), false).await?;
                let form = match item {
                    Some(key) => FormState::from_item(&collection.schema, &self.resolve_item(&key)?),
                    None => FormState::new(&collection.schema),
                };
                writeln!(self.out, "{} {}", collection.icon, collection.name)?;
                for control in form.controls() {
                    writeln!(self.out, "  {}", render::control_line(&control))?;
                }
                Ok(())
            }
            Command::AddItem { list, values } => {
                let collection = self.target_collection(list.as_deref(), false).await?;
                let mut form = FormState::new(&collection.schema);
                fill_form(&mut form, &values)?;
                let data = form.submit().map_err(Error::from)?;
                let item = self.app.items.create(&collection.id, data).await?;
                writeln!(self.out, "Added {}", render::item_line(&collection.schema, &item))?;
                Ok(())
            }
            Command::EditItem { item, list, values } => {
                let collection = self.target_collection(list.as_deref(), false).await?;
                let stored = self.resolve_item(&item)?;
                let mut form = FormState::from_item(&collection.schema, &stored);
                fill_form(&mut form, &values)?;
                let mut data = stored.data.clone();
                data.retain(|name, _| collection.schema.field(name).is_none());
                data.extend(form.submit().map_err(Error::from)?);
                let updated = self.app.items.update(&stored.id, data).await?;
                writeln!(self.out, "Updated {}", render::item_line(&collection.schema, &updated))?;
                Ok(())
            }
            Command::DeleteItem { item, list } => {
                self.target_collection(list.as_deref(), false).await?;
                let stored = self.resolve_item(&item)?;
                let undoable = self.app.items.delete(&stored.id).await?;
                if undoable {
                    let seconds = self.app.items.undo_window().as_secs_f32();
                    writeln!(
                        self.out,
                        "Deleted [{}]; `undo` within {seconds}s to restore it",
                        render::short_id(stored.id)
                    )?;
                } else {
                    writeln!(self.out, "Deleted [{}]", render::short_id(stored.id))?;
                }
                Ok(())
            }
            Command::Undo => {
                match self.app.items.undo_delete().await? {
                    Some(item) => writeln!(self.out, "Restored [{}]", render::short_id(item.id))?,
                    None => writeln!(self.out, "Nothing to undo")?,
                }
                Ok(())
            }
            Command::Dismiss => {
                if !self.app.items.clear_deleted_slot() {
                    writeln!(self.out, "Nothing to dismiss")?;
                }
                Ok(())
            }
            Command::Shell => Err(CliError::usage("already in a shell")),
        }
    }

    async fn sign_up(&mut self, email: &str, password: &str) -> Result<(), CliError> {
        match self.app.auth.sign_up(email, password).await? {
            Some(user) => {
                self.app.sync_user().await?;
                writeln!(self.out, "Signed up as {}", render::user_line(&user))?;
            }
            None => writeln!(
                self.out,
                "Account created; confirm it from the email sent to {}, then sign in",
                email.trim()
            )?,
        }
        Ok(())
    }

    async fn lists(&mut self) -> Result<(), CliError> {
        self.app.collections.fetch_list().await?;
        let state = self.app.collections.snapshot();
        if state.collections.is_empty() {
            writeln!(self.out, "No collections yet")?;
        }
        for collection in &state.collections {
            writeln!(self.out, "{}", render::collection_line(collection))?;
        }
        Ok(())
    }

    async fn create_list(
        &mut self,
        name: String,
        fields: Vec<Field>,
        color: Option<String>,
        icon: Option<String>,
    ) -> Result<(), CliError> {
        let mut draft = SchemaDraft::new(name);
        for field in &fields {
            draft
                .add_field(&field.name, field.field_type, field.required)
                .map_err(Error::from)?;
        }
        let (name, schema) = draft.finish().map_err(Error::from)?;
        let request = NewCollectionRequest {
            name,
            schema,
            color: color.as_deref().map(resolve_color).transpose()?,
            icon: icon.as_deref().map(resolve_icon).transpose()?,
        };
        let created = self.app.collections.create(request).await?;
        writeln!(self.out, "Created {}", render::collection_line(&created))?;
        Ok(())
    }

    async fn edit_list(&mut self, key: &str, edit: ListEdit) -> Result<(), CliError> {
        let collection = self.resolve_collection(key).await?;
        let schema_changed = !edit.add_fields.is_empty() || !edit.remove_fields.is_empty();

        let mut draft = SchemaDraft::from_existing(&collection.name, &collection.schema);
        if let Some(name) = &edit.name {
            draft.rename(name);
        }
        for name in &edit.remove_fields {
            let index = draft
                .fields()
                .iter()
                .position(|field| field.name == *name)
                .ok_or_else(|| CliError::usage(format!("{} has no field {name}", collection.name)))?;
            draft.remove_field(index);
        }
        for field in &edit.add_fields {
            draft
                .add_field(&field.name, field.field_type, field.required)
                .map_err(Error::from)?;
        }
        let (name, schema) = draft.finish().map_err(Error::from)?;

        let patch = CollectionPatch {
            name: (name != collection.name).then_some(name),
            schema: schema_changed.then_some(schema),
            color: edit.color.as_deref().map(resolve_color).transpose()?,
            icon: edit.icon.as_deref().map(resolve_icon).transpose()?,
            is_favorite: None,
        };
        if patch.is_empty() {
            return Err(CliError::usage("nothing to change"));
        }
        let updated = self.app.collections.update(&collection.id, patch).await?;
        let open = self
            .app
            .items
            .snapshot()
            .current
            .is_some_and(|current| current.id == updated.id);
        if open {
            self.app.open_collection(&updated.id).await?;
        }
        writeln!(self.out, "Updated {}", render::collection_line(&updated))?;
        Ok(())
    }

    fn palette(&mut self) -> Result<(), CliError> {
        writeln!(self.out, "Colours:")?;
        for (name, hex) in COLOR_PALETTE {
            writeln!(self.out, "  {name:<8}{hex}")?;
        }
        writeln!(self.out, "Icons:")?;
        writeln!(self.out, "  {}", ICON_PALETTE.join(" "))?;
        Ok(())
    }

    fn print_items(&mut self, collection: &Collection, items: &[Item]) -> Result<(), CliError> {
        writeln!(self.out, "{} {}", collection.icon, collection.name)?;
        if items.is_empty() {
            writeln!(self.out, "  No items")?;
        }
        for item in items {
            writeln!(self.out, "  {}", render::item_line(&collection.schema, item))?;
        }
        if let Some(pending) = self.app.items.pending_undo() {
            writeln!(
                self.out,
                "  [{}] deleted; `undo` to restore",
                render::short_id(pending.id)
            )?;
        }
        Ok(())
    }

    /// Collection addressed by id, id prefix or name.
    async fn resolve_collection(&self, key: &str) -> Result<Collection, CliError> {
        if let Some(found) = find_collection(&self.app.collections.snapshot().collections, key)? {
            return Ok(found);
        }
        self.app.collections.fetch_list().await?;
        find_collection(&self.app.collections.snapshot().collections, key)?
            .ok_or_else(|| CliError::usage(format!("no collection matches `{key}`")))
    }

    /// Open `key` when given, otherwise use the collection already open.
    /// With `refresh`, items of an already open collection are reloaded.
    async fn target_collection(
        &self,
        key: Option<&str>,
        refresh: bool,
    ) -> Result<Collection, CliError> {
        let current = self.app.items.snapshot().current;
        let Some(key) = key else {
            let current = current.ok_or_else(|| {
                CliError::usage("no collection open; pass --list or run `open` first")
            })?;
            if refresh {
                self.app.items.fetch_items(&current.id).await?;
            }
            return Ok(current);
        };

        let wanted = self.resolve_collection(key).await?;
        match current {
            Some(current) if current.id == wanted.id => {
                if refresh {
                    self.app.items.fetch_items(&current.id).await?;
                }
                Ok(current)
            }
            _ => Ok(self.app.open_collection(&wanted.id).await?),
        }
    }

    /// Item of the open collection addressed by id or id prefix.
    fn resolve_item(&self, key: &str) -> Result<Item, CliError> {
        let needle = key.trim().to_ascii_lowercase();
        let mut matches = self
            .app
            .items
            .snapshot()
            .items
            .into_iter()
            .filter(|item| !needle.is_empty() && item.id.to_string().starts_with(&needle));
        let found = matches
            .next()
            .ok_or_else(|| CliError::usage(format!("no item matches `{key}`")))?;
        if matches.next().is_some() {
            return Err(CliError::usage(format!("`{key}` matches several items")));
        }
        Ok(found)
    }
}

struct ListEdit {
    name: Option<String>,
    add_fields: Vec<Field>,
    remove_fields: Vec<String>,
    color: Option<String>,
    icon: Option<String>,
}

fn find_collection(collections: &[Collection], key: &str) -> Result<Option<Collection>, CliError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::usage("collection must not be empty"));
    }
    let needle = key.to_ascii_lowercase();
    let matches: Vec<_> = collections
        .iter()
        .filter(|collection| {
            collection.id.to_string().starts_with(&needle)
                || collection.name.to_lowercase() == key.to_lowercase()
        })
        .collect();
    match matches.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some((*only).clone())),
        _ => Err(CliError::usage(format!(
            "`{key}` matches several collections; use its id"
        ))),
    }
}

fn sort_settings(
    collection: &Collection,
    field: &str,
    order: crate::domain::SortOrder,
) -> Result<SortSettings, CliError> {
    if field.eq_ignore_ascii_case(SORT_BY_CREATION) {
        return Ok(SortSettings::created_at(order));
    }
    let field = collection
        .schema
        .field(field)
        .ok_or_else(|| CliError::usage(format!("{} has no field {field}", collection.name)))?;
    Ok(SortSettings::by_field(field.name.clone(), order))
}

fn fill_form(form: &mut FormState, values: &[Assignment]) -> Result<(), CliError> {
    for assignment in values {
        let field_type = form
            .schema()
            .field_type(&assignment.field)
            .ok_or_else(|| CliError::usage(format!("unknown field {}", assignment.field)))?;
        if field_type == FieldType::Boolean {
            form.set_flag(&assignment.field, parse_flag(&assignment.value)?);
        } else {
            form.set_text(&assignment.field, assignment.value.clone());
        }
    }
    Ok(())
}

fn parse_flag(raw: &str) -> Result<bool, CliError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" | "" => Ok(false),
        other => Err(CliError::usage(format!("expected yes or no, got `{other}`"))),
    }
}

fn resolve_color(raw: &str) -> Result<String, CliError> {
    let raw = raw.trim();
    if let Some((_, hex)) = COLOR_PALETTE
        .iter()
        .find(|(name, hex)| name.eq_ignore_ascii_case(raw) || hex.eq_ignore_ascii_case(raw))
    {
        return Ok((*hex).to_owned());
    }
    let is_hex = raw.len() == 7
        && raw.starts_with('#')
        && raw[1..].chars().all(|ch| ch.is_ascii_hexdigit());
    if is_hex {
        Ok(raw.to_ascii_lowercase())
    } else {
        Err(CliError::usage(format!(
            "unknown colour `{raw}`; use a palette name or #rrggbb"
        )))
    }
}

fn resolve_icon(raw: &str) -> Result<String, CliError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CliError::usage("icon must not be empty"));
    }
    Ok(raw.to_owned())
}

/// Parse the process arguments.
///
/// # Errors
///
/// Returns clap's error, which renders usage or help text.
pub fn parse_args() -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse()
}
