//! `remap(path, usage)`: the single routine every intercepted call goes
//! through (§4.5 "Path rewriting in the shim").

use crate::client::Transport;
use ekam_rpc::{Request, Response};
use std::path::Path;

/// Whether an intercepted call is reading or writing the path in question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    /// `open(O_RDONLY)`, `stat`, `access`, ... — resolves via `findInput`.
    Read,
    /// `open(O_WRONLY|O_CREAT)`, `fopen(.., "w")`, ... — resolves via `newOutput`.
    Write,
}

/// What `remap` decided to do with a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remapped {
    /// Use this path unchanged; no RPC round trip needed.
    Passthrough(String),
    /// Use this path instead, as returned by the engine.
    Rewritten(String),
    /// The engine has no provider for this path; the original call should
    /// fail as if the path didn't exist.
    NotFound,
    /// Writing outside the project and outside a bypass dir (§6 table).
    Rejected,
}

const ALWAYS_BYPASSED: &[&str] = &["/tmp", "/var/tmp", "/proc"];

fn bypass_dirs() -> Vec<String> {
    std::env::var("EKAM_REMAP_BYPASS_DIRS")
        .ok()
        .map(|raw| raw.split(':').filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn is_bypassed(path: &str) -> bool {
    ALWAYS_BYPASSED.iter().any(|root| path.starts_with(root)) || bypass_dirs().iter().any(|root| path.starts_with(root.as_str()))
}

/// Parse the synthetic `/ekam-provider/<tagtype>/<rest>` namespace.
/// `/ekam-provider/<tagtype>` alone (no further `/`) is the placeholder
/// empty-directory handle and is reported as `None` here; callers treat a
/// bare-type request as "list this directory," not a tag lookup.
fn parse_provider_path(path: &str) -> Option<Option<String>> {
    let rest = path.strip_prefix("/ekam-provider/")?;
    match rest.split_once('/') {
        Some((tagtype, tail)) => Some(Some(format!("{tagtype}:{tail}"))),
        None if !rest.is_empty() => Some(None),
        None => None,
    }
}

/// Rewrite `path` for `usage`, issuing whatever RPC call is needed.
pub fn remap(client: &mut impl Transport, path: &str, usage: Usage) -> Remapped {
    if path.contains('\n') {
        return Remapped::Rejected;
    }

    if let Some(tag) = parse_provider_path(path) {
        return match tag {
            None => Remapped::Passthrough(path.to_string()),
            Some(tag) => {
                let req = match usage {
                    Usage::Read => Request::FindProvider { tag },
                    Usage::Write => Request::NewProvider { tag },
                };
                match client.call(req) {
                    Ok(Response::Path(resolved)) => Remapped::Rewritten(resolved),
                    Ok(Response::Empty) | Err(_) => Remapped::NotFound,
                }
            }
        };
    }

    if is_bypassed(path) {
        return Remapped::Passthrough(path.to_string());
    }

    if Path::new(path).is_absolute() {
        return match usage {
            Usage::Read => {
                let _ = client.call(Request::NoteInput { path: path.to_string() });
                Remapped::Passthrough(path.to_string())
            }
            Usage::Write => Remapped::Rejected,
        };
    }

    let req = match usage {
        Usage::Read => Request::FindInput { path: path.to_string() },
        Usage::Write => Request::NewOutput { path: path.to_string() },
    };
    match client.call(req) {
        Ok(Response::Path(resolved)) => Remapped::Rewritten(resolved),
        Ok(Response::Empty) | Err(_) => Remapped::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ekam_rpc::RpcError;

    struct FakeTransport {
        calls: Vec<Request>,
        next: Response,
    }

    impl Transport for FakeTransport {
        fn call(&mut self, req: Request) -> Result<Response, RpcError> {
            self.calls.push(req);
            Ok(self.next.clone())
        }
    }

    #[test]
    fn tmp_paths_pass_through() {
        assert!(is_bypassed("/tmp/foo"));
        assert!(is_bypassed("/var/tmp/bar"));
        assert!(is_bypassed("/proc/self/status"));
    }

    #[test]
    fn provider_path_splits_tagtype_and_rest() {
        assert_eq!(
            parse_provider_path("/ekam-provider/header/x.h"),
            Some(Some("header:x.h".to_string()))
        );
    }

    #[test]
    fn bare_provider_type_is_the_placeholder_directory() {
        assert_eq!(parse_provider_path("/ekam-provider/header"), Some(None));
    }

    #[test]
    fn non_provider_path_is_not_parsed() {
        assert_eq!(parse_provider_path("/usr/include/stdio.h"), None);
    }

    #[test]
    fn embedded_newline_is_rejected_before_any_rpc_call() {
        let mut fake = FakeTransport { calls: Vec::new(), next: Response::Empty };
        let result = remap(&mut fake, "a\nb", Usage::Read);
        assert_eq!(result, Remapped::Rejected);
        assert!(fake.calls.is_empty());
    }

    #[test]
    fn relative_read_issues_find_input() {
        let mut fake = FakeTransport {
            calls: Vec::new(),
            next: Response::Path("tmp/a.cpp/x.h".to_string()),
        };
        let result = remap(&mut fake, "x.h", Usage::Read);
        assert_eq!(result, Remapped::Rewritten("tmp/a.cpp/x.h".to_string()));
        assert_eq!(fake.calls, vec![Request::FindInput { path: "x.h".to_string() }]);
    }

    #[test]
    fn relative_write_issues_new_output() {
        let mut fake = FakeTransport {
            calls: Vec::new(),
            next: Response::Path("tmp/a.cpp/a.o".to_string()),
        };
        let result = remap(&mut fake, "a.o", Usage::Write);
        assert_eq!(result, Remapped::Rewritten("tmp/a.cpp/a.o".to_string()));
        assert_eq!(fake.calls, vec![Request::NewOutput { path: "a.o".to_string() }]);
    }

    #[test]
    fn provider_path_read_issues_find_provider() {
        let mut fake = FakeTransport {
            calls: Vec::new(),
            next: Response::Path("/proj/src/x.h".to_string()),
        };
        let result = remap(&mut fake, "/ekam-provider/header/x.h", Usage::Read);
        assert_eq!(result, Remapped::Rewritten("/proj/src/x.h".to_string()));
        assert_eq!(fake.calls, vec![Request::FindProvider { tag: "header:x.h".to_string() }]);
    }

    #[test]
    fn absolute_write_outside_project_is_rejected() {
        let mut fake = FakeTransport { calls: Vec::new(), next: Response::Empty };
        let result = remap(&mut fake, "/usr/lib/whatever.so", Usage::Write);
        assert_eq!(result, Remapped::Rejected);
        assert!(fake.calls.is_empty());
    }

    #[test]
    fn absolute_read_outside_project_notes_input_and_passes_through() {
        let mut fake = FakeTransport { calls: Vec::new(), next: Response::Empty };
        let result = remap(&mut fake, "/usr/include/stdio.h", Usage::Read);
        assert_eq!(result, Remapped::Passthrough("/usr/include/stdio.h".to_string()));
        assert_eq!(fake.calls, vec![Request::NoteInput { path: "/usr/include/stdio.h".to_string() }]);
    }
}
