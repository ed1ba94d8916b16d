//! Whole-document formatting through `zig fmt --stdin`.

use std::io::Write as _;
use std::process::{Command, Stdio};

use lsp_types::{DocumentFormattingParams, Position, Range, TextEdit};
use serde_json::Value;
use zls_protocol::JsonRpcError;

use crate::server::Server;

impl Server {
    pub(crate) fn handle_formatting(
        &mut self,
        params: Option<Value>,
    ) -> Result<Option<Value>, JsonRpcError> {
        let Some(params) = self.parse_params::<DocumentFormattingParams>(params) else {
            return Ok(Some(Value::Null));
        };
        let uri = params.text_document.uri.as_str().to_string();
        let Some(zig_exe) = self.config.zig_exe_path.clone() else {
            self.log_debug("formatting requested without a configured toolchain");
            return Ok(Some(Value::Null));
        };
        let Some(handle) = self.store.get_handle(&uri) else {
            self.log_warn(format!("unknown document {uri}"));
            return Ok(Some(Value::Null));
        };
        let text = handle.document.text.clone();
        let end = handle.document.line_index.offset_to_position(&text, text.len(), self.encoding);

        let formatted = match run_fmt(&zig_exe, &text) {
            Ok(formatted) => formatted,
            Err(err) => {
                self.log_error(format!("zig fmt failed: {err}"));
                return Ok(Some(Value::Null));
            }
        };

        let edits = vec![TextEdit {
            range: Range { start: Position::new(0, 0), end },
            new_text: formatted,
        }];
        Ok(Some(serde_json::to_value(edits).unwrap_or(Value::Null)))
    }
}

fn run_fmt(zig_exe: &std::path::Path, text: &str) -> std::io::Result<String> {
    let mut child = Command::new(zig_exe)
        .arg("fmt")
        .arg("--stdin")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin.write_all(text.as_bytes())?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(std::io::Error::other(format!("exit status {}", output.status)));
    }
    String::from_utf8(output.stdout).map_err(|_| std::io::Error::other("non-UTF-8 output"))
}
