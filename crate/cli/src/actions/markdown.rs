use std::{fmt::Write, fs, path::PathBuf};

use clap::{Arg, Command, Parser, builder::StyledStr};

use crate::error::result::KmsCliResult;

const ROOT_COMMAND: &str = "okms";

/// Generate the CLI documentation as markdown
#[derive(Parser, Debug)]
pub struct MarkdownAction {
    /// The file to export the markdown to
    #[arg(required = true, value_name = "FILE")]
    markdown_file: PathBuf,
}

impl MarkdownAction {
    pub fn process(&self, cmd: &Command) -> KmsCliResult<()> {
        let output = render(cmd)?;
        fs::write(&self.markdown_file, output)?;
        println!("Markdown generated to {}", self.markdown_file.display());
        Ok(())
    }
}

/// Markdown reference of `cmd` and all its visible subcommands
fn render(cmd: &Command) -> KmsCliResult<String> {
    let mut output = String::new();
    writeln!(output)?;
    write_command(&mut output, "", "", cmd)?;
    Ok(output)
}

fn write_command(out: &mut String, index: &str, parent: &str, cmd: &Command) -> KmsCliResult<()> {
    let full_command = if parent.is_empty() {
        ROOT_COMMAND.to_owned()
    } else {
        writeln!(out, "---\n")?;
        format!("{parent} {}", cmd.get_name())
    };
    writeln!(out, "## {index} {full_command}")?;

    if let Some(about) = cmd.get_long_about().or_else(|| cmd.get_about()) {
        writeln!(out)?;
        to_md(out, about)?;
        writeln!(out)?;
    }

    writeln!(out, "### Usage")?;
    write!(out, "`{full_command}")?;
    if cmd.has_subcommands() {
        write!(out, " <subcommand>")?;
    }
    if cmd.get_arguments().any(|a| !a.is_positional() && !a.is_hide_set()) {
        write!(out, " [options]")?;
    }
    for pos in cmd.get_positionals() {
        write!(out, " {pos}")?;
    }
    writeln!(out, "`")?;

    let arguments: Vec<&Arg> = cmd.get_arguments().filter(|a| !a.is_hide_set()).collect();
    if !arguments.is_empty() {
        writeln!(out, "### Arguments")?;
    }
    for arg in arguments {
        write_argument(out, arg)?;
    }

    writeln!(out)?;
    let sub_commands = write_subcommands(out, index, &full_command, cmd)?;
    for (i, sub_command) in sub_commands.into_iter().enumerate() {
        write_command(out, &child_index(index, i), &full_command, sub_command)?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_argument(out: &mut String, arg: &Arg) -> KmsCliResult<()> {
    write!(out, "`")?;
    if let Some(long) = arg.get_long() {
        write!(out, "--{long}")?;
    }
    if let Some(short) = arg.get_short() {
        write!(out, " [-{short}]")?;
    }
    if let Some(name) = arg.get_value_names().and_then(|n| n.first()) {
        write!(out, " <{name}>")?;
    }
    write!(out, "`")?;
    if let Some(help) = arg.get_help() {
        write!(out, " ")?;
        to_md(out, help)?;
    }
    let takes_values = arg.get_action().takes_values();
    let possible_values = arg.get_possible_values();
    if takes_values && !possible_values.is_empty() {
        let names: Vec<String> = possible_values
            .iter()
            .filter(|pv| !pv.is_hide_set())
            .map(|pv| format!("{:?}", pv.get_name()))
            .collect();
        if !names.is_empty() {
            writeln!(out)?;
            write!(out, "Possible values:  `{}`", names.join(", "))?;
        }
    }
    let defaults = arg.get_default_values();
    if takes_values && !defaults.is_empty() {
        let defaults: Vec<String> = defaults
            .iter()
            .map(|d| format!("\"{}\"", d.to_string_lossy()))
            .collect();
        write!(out, " [default: `{}`]", defaults.join(", "))?;
    }
    writeln!(out)?;
    writeln!(out)?;
    Ok(())
}

fn child_index(parent_index: &str, i: usize) -> String {
    if parent_index.is_empty() {
        format!("{}", i + 1)
    } else {
        format!("{parent_index}.{}", i + 1)
    }
}

fn write_subcommands<'a>(
    out: &mut String,
    parent_index: &str,
    parent_command: &str,
    cmd: &'a Command,
) -> KmsCliResult<Vec<&'a Command>> {
    let visible: Vec<&Command> = cmd.get_subcommands().filter(|c| !c.is_hide_set()).collect();
    if !visible.is_empty() {
        writeln!(out, "### Subcommands\n")?;
    }
    for (i, sub_command) in visible.iter().enumerate() {
        let index = child_index(parent_index, i);
        let anchor = format!("{index} {parent_command} {}", sub_command.get_name())
            .to_lowercase()
            .replace(' ', "-")
            .replace('.', "");
        write!(out, "**`{}`** [[{index}]](#{anchor}) ", sub_command.get_name())?;
        if let Some(about) = sub_command.get_about() {
            write!(out, " ")?;
            to_md(out, about)?;
        }
        writeln!(out)?;
    }
    Ok(visible)
}

/// Write a help text, with blank lines around bullet lists
fn to_md(out: &mut String, text: &StyledStr) -> KmsCliResult<()> {
    let mut in_list = false;
    for line in text.to_string().lines() {
        let is_list_item = line.trim_start().starts_with(['-', '*']);
        if in_list != is_list_item {
            in_list = is_list_item;
            writeln!(out)?;
        }
        writeln!(out, "{line}")?;
    }
    Ok(())
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use clap::{Arg, Command};

    use super::render;

    #[test]
    fn test_render_skips_hidden_commands() {
        let cmd = Command::new("okms")
            .about("Manage an OKMS domain")
            .subcommand(
                Command::new("keys")
                    .about("Manage service keys")
                    .subcommand(
                        Command::new("list")
                            .about("List keys")
                            .arg(
                                Arg::new("page-size")
                                    .long("page-size")
                                    .value_name("SIZE")
                                    .default_value("100"),
                            ),
                    ),
            )
            .subcommand(Command::new("markdown").hide(true));
        let md = render(&cmd).unwrap();
        assert!(md.contains("## 1 okms keys"), "{md}");
        assert!(md.contains("## 1.1 okms keys list"), "{md}");
        assert!(md.contains("[[1.1]](#11-okms-keys-list)"), "{md}");
        assert!(md.contains("`--page-size <SIZE>`"), "{md}");
        assert!(md.contains("[default: `\"100\"`]"), "{md}");
        assert!(!md.contains("markdown"), "{md}");
    }
}
