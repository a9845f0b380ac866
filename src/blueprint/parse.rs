// NØNOS Operating System
// Copyright (C) 2026 NØNOS Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Blueprint text parser.
//!
//! Line-oriented, whitespace-separated. `;` starts a comment running to end
//! of line, `"…"` quotes a token with `\` as a one-character escape. Every
//! directive line must end in a newline, including the last.

use std::path::Path;

use crate::errors::{BuildError, BuildResult};
use crate::file::read_text_file;

use super::types::{Blueprint, Module, ModuleMetadata};

/// Parse an unsigned 32-bit numeral the way C's `strtoul(.., .., 0)` does:
/// `0x`/`0X` prefix is hexadecimal, a leading `0` is octal, anything else
/// is decimal.
pub fn parse_c_u32(text: &str) -> Option<u32> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if text.len() > 1 && text.starts_with('0') {
        u32::from_str_radix(&text[1..], 8).ok()
    } else {
        text.parse().ok()
    }
}

pub fn parse_file(path: &Path) -> BuildResult<Blueprint> {
    parse_str(&read_text_file(path)?)
}

pub fn parse_str(text: &str) -> BuildResult<Blueprint> {
    enum Lexer {
        Normal,
        Quoted,
        Escaped,
        Comment,
    }

    let mut blueprint = Blueprint::new();
    let mut state = ParserState::Root;

    let mut lexer = Lexer::Normal;
    let mut tokens: Vec<String> = Vec::new();
    let mut buffer = String::new();
    let mut buffer_active = false;

    for character in text.chars() {
        match lexer {
            Lexer::Normal => {
                if character == '"' {
                    buffer_active = true;
                    lexer = Lexer::Quoted;
                } else if character == ';' {
                    lexer = Lexer::Comment;
                } else if character.is_whitespace() {
                    if buffer_active {
                        tokens.push(std::mem::take(&mut buffer));
                        buffer_active = false;
                    }
                    if character == '\n' && !tokens.is_empty() {
                        process_line(&mut blueprint, &mut state, std::mem::take(&mut tokens))?;
                    }
                } else {
                    buffer.push(character);
                    buffer_active = true;
                }
            }

            Lexer::Quoted => {
                if character == '\\' {
                    lexer = Lexer::Escaped;
                } else if character == '"' {
                    lexer = Lexer::Normal;
                } else {
                    buffer.push(character);
                }
            }

            Lexer::Escaped => {
                buffer.push(character);
                lexer = Lexer::Quoted;
            }

            Lexer::Comment => {
                if character == '\n' {
                    if buffer_active {
                        tokens.push(std::mem::take(&mut buffer));
                        buffer_active = false;
                    }
                    if !tokens.is_empty() {
                        process_line(&mut blueprint, &mut state, std::mem::take(&mut tokens))?;
                    }
                    lexer = Lexer::Normal;
                }
            }
        }
    }

    if !matches!(lexer, Lexer::Normal) {
        return Err(BuildError::BlueprintParse(
            "end of file reached before closing quote".to_string(),
        ));
    }
    if buffer_active || !tokens.is_empty() {
        return Err(BuildError::BlueprintParse(
            "no newline at the end of file".to_string(),
        ));
    }

    Ok(blueprint)
}

enum ParserState {
    Root,
    Metadata,
    Values,
}

fn missing(what: &str) -> BuildError {
    BuildError::BlueprintParse(format!("{} expected", what))
}

fn process_line(
    blueprint: &mut Blueprint,
    state: &mut ParserState,
    line: Vec<String>,
) -> BuildResult<()> {
    let mut tokens = line.into_iter();
    let control = tokens.next().expect("process_line requires tokens");

    match state {
        ParserState::Root => match control.as_str() {
            "MODULE" => {
                let name = tokens.next().ok_or_else(|| missing("module name"))?;
                let kind = tokens.next().ok_or_else(|| missing("module type"))?;
                let path = tokens.next().ok_or_else(|| missing("module file name"))?;

                blueprint.modules.push(Module {
                    name,
                    kind,
                    path: path.into(),
                    metadata: Vec::new(),
                });

                if let Some(token) = tokens.next() {
                    if token != "METADATA" {
                        return Err(BuildError::BlueprintParse(
                            "'METADATA' or end of line expected".to_string(),
                        ));
                    }
                    *state = ParserState::Metadata;
                }
            }

            "IMAGE_BASE" => {
                let token = tokens.next().ok_or_else(|| missing("number"))?;
                blueprint.image_base = parse_c_u32(&token).ok_or_else(|| {
                    BuildError::BlueprintParse(format!("invalid number '{}'", token))
                })?;
            }

            "KICKSTART" => {
                let token = tokens.next().ok_or_else(|| missing("file name"))?;
                blueprint.kickstart = token.into();
            }

            other => {
                return Err(BuildError::BlueprintParse(format!(
                    "invalid token in root context: '{}'",
                    other
                )));
            }
        },

        ParserState::Metadata => {
            let module = blueprint
                .modules
                .last_mut()
                .expect("metadata context implies a current module");

            match control.as_str() {
                "END" => *state = ParserState::Root,

                "DTB" => {
                    let token = tokens.next().ok_or_else(|| missing("metadata value"))?;
                    module.metadata.push(ModuleMetadata::Dtb(token.into()));
                }

                "KERNEND" => module.metadata.push(ModuleMetadata::Kernend),

                "HOWTO" => {
                    let token = tokens.next().ok_or_else(|| missing("metadata value"))?;
                    module.metadata.push(ModuleMetadata::Howto(token));
                }

                "ENVIRONMENT" => {
                    module
                        .metadata
                        .push(ModuleMetadata::Environment(Vec::new()));
                    *state = ParserState::Values;
                }

                other => {
                    return Err(BuildError::BlueprintParse(format!(
                        "invalid token in metadata context: '{}'",
                        other
                    )));
                }
            }
        }

        ParserState::Values => match control.as_str() {
            "END" => *state = ParserState::Metadata,

            "SET" => {
                let key = tokens.next().ok_or_else(|| missing("key"))?;
                let value = tokens.next().ok_or_else(|| missing("value"))?;

                let entry = blueprint
                    .modules
                    .last_mut()
                    .and_then(|module| module.metadata.last_mut())
                    .expect("values context implies a current environment");
                match entry {
                    ModuleMetadata::Environment(pairs) => pairs.push((key, value)),
                    _ => unreachable!("values context holds an environment entry"),
                }
            }

            other => {
                return Err(BuildError::BlueprintParse(format!(
                    "invalid token in environment context: '{}'",
                    other
                )));
            }
        },
    }

    Ok(())
}
