//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{Field, FieldType, SortOrder};

/// `collector` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "collector",
    about = "Manage schema-driven collections and their items",
    version
)]
pub struct CliArgs {
    /// Use the in-process backend instead of the hosted one.
    #[arg(long)]
    pub offline: bool,
    /// Session file override.
    #[arg(long = "session-file", value_name = "path")]
    pub session_file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

/// One line typed into the interactive shell.
#[derive(Debug, Clone, Parser)]
#[command(name = "shell", no_binary_name = true, disable_version_flag = true)]
pub(crate) struct ShellLine {
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Operations offered by the front end.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create an account.
    SignUp {
        email: String,
        password: String,
    },
    /// Sign in with email and password.
    SignIn {
        email: String,
        password: String,
    },
    /// Sign out and forget the session.
    SignOut,
    /// Show the signed-in user.
    Whoami,
    /// List collections, favourites first.
    Lists,
    /// Create a collection.
    CreateList {
        name: String,
        /// Field as `name:type[:required]`; repeat in display order.
        #[arg(long = "field", value_name = "name:type[:required]", value_parser = parse_field_spec)]
        fields: Vec<Field>,
        /// Palette colour name or `#rrggbb`.
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    /// Rename a collection or change its fields, colour or icon.
    EditList {
        list: String,
        #[arg(long)]
        name: Option<String>,
        /// Append a field as `name:type[:required]`.
        #[arg(long = "add-field", value_name = "name:type[:required]", value_parser = parse_field_spec)]
        add_fields: Vec<Field>,
        /// Remove a field by name. Stored values are kept.
        #[arg(long = "remove-field", value_name = "name")]
        remove_fields: Vec<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    /// Toggle a collection's favourite flag.
    Favorite { list: String },
    /// Delete a collection and all of its items.
    DeleteList { list: String },
    /// Show the colour and icon palettes.
    Palette,
    /// Open a collection for the item commands that follow.
    Open { list: String },
    /// Show the items of a collection.
    Items {
        #[arg(long)]
        list: Option<String>,
        /// Field name, or `created_at`.
        #[arg(long = "sort-by", value_name = "field")]
        sort_by: Option<String>,
        #[arg(long, default_value_t = SortOrder::Descending)]
        order: SortOrder,
        /// Only show items with a value containing this text.
        #[arg(long)]
        search: Option<String>,
    },
    /// Show the form controls for a new item, or for editing one.
    Form {
        #[arg(long)]
        list: Option<String>,
        #[arg(long)]
        item: Option<String>,
    },
    /// Add an item.
    AddItem {
        #[arg(long)]
        list: Option<String>,
        /// Field value as `name=value`.
        #[arg(long = "set", value_name = "name=value", value_parser = parse_assignment)]
        values: Vec<Assignment>,
    },
    /// Change values of an item.
    EditItem {
        item: String,
        #[arg(long)]
        list: Option<String>,
        #[arg(long = "set", value_name = "name=value", value_parser = parse_assignment)]
        values: Vec<Assignment>,
    },
    /// Delete an item. It can be restored with `undo` for a few seconds.
    DeleteItem {
        item: String,
        #[arg(long)]
        list: Option<String>,
    },
    /// Restore the last deleted item.
    Undo,
    /// Dismiss the pending undo.
    Dismiss,
    /// Read commands line by line from standard input.
    Shell,
}

/// `name=value` pair supplied for one form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub field: String,
    pub value: String,
}

pub(crate) fn parse_assignment(raw: &str) -> Result<Assignment, String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err("field name must not be empty".to_owned());
    }
    Ok(Assignment {
        field: field.to_owned(),
        value: value.to_owned(),
    })
}

pub(crate) fn parse_field_spec(raw: &str) -> Result<Field, String> {
    let mut parts = raw.split(':').map(str::trim);
    let name = parts.next().unwrap_or_default();
    let field_type = match parts.next() {
        Some(kind) => kind.parse::<FieldType>().map_err(|err| err.to_string())?,
        None => FieldType::Text,
    };
    let required = match parts.next() {
        None => false,
        Some(flag) if flag.eq_ignore_ascii_case("required") => true,
        Some(other) => return Err(format!("expected `required`, got `{other}`")),
    };
    if parts.next().is_some() {
        return Err(format!("too many `:` separators in `{raw}`"));
    }
    Ok(Field::new(name, field_type, required))
}

/// Split a shell line into words, keeping double-quoted runs together.
pub(crate) fn split_words(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;
    let mut chars = line.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            '\\' if quoted => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => return Err("dangling escape".to_owned()),
            },
            ch if ch.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            ch => {
                current.push(ch);
                in_word = true;
            }
        }
    }
    if quoted {
        return Err("unterminated quote".to_owned());
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
