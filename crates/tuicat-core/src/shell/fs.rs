use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    File { content: String },
    Directory { children: BTreeMap<String, Node> },
}

impl Node {
    pub fn file(content: &str) -> Self {
        Node::File {
            content: content.to_string(),
        }
    }

    pub fn dir<const N: usize>(entries: [(&str, Node); N]) -> Self {
        Node::Directory {
            children: entries
                .into_iter()
                .map(|(name, node)| (name.to_string(), node))
                .collect(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }

    pub fn children(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Node::Directory { children } => Some(children),
            Node::File { .. } => None,
        }
    }
}

/// Immutable tree the offline shell walks.
#[derive(Clone, Debug)]
pub struct FileSystem {
    root: Node,
}

impl FileSystem {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    pub fn builtin() -> Self {
        Self::new(Node::dir([
            (
                "projects",
                Node::dir([
                    ("nidalee.rs", Node::file("Project link: https://nidal.ee")),
                    (
                        "tui-archive.txt",
                        Node::file("A list of notable TUI projects from the past."),
                    ),
                ]),
            ),
            ("readme.md", Node::file(README)),
        ]))
    }

    /// Looks up a normalized absolute path.
    pub fn lookup(&self, path: &str) -> Option<&Node> {
        let mut current = &self.root;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current = current.children()?.get(part)?;
        }
        Some(current)
    }

    pub fn directory(&self, path: &str) -> Option<&BTreeMap<String, Node>> {
        self.lookup(path)?.children()
    }
}

/// Resolves `target` against `cwd` into a normalized absolute path. `..`
/// never climbs above `/`.
pub fn resolve_path(cwd: &str, target: &str) -> String {
    let mut parts: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        cwd.split('/').filter(|p| !p.is_empty()).collect()
    };
    for part in target.split('/').filter(|p| !p.is_empty()) {
        match part {
            "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    format!("/{}", parts.join("/"))
}

const README: &str = "\
Welcome to the tui.cat Interactive Terminal!
This is a simulated shell environment. Explore using commands like:
  ls - list files and directories
  cd <directory> - change directory
  cat <file> - view file contents
  theme - change the terminal theme
  neo - display system info
  help - for all commands
Try: cd projects then ls
(Press Tab for basic autocompletion of filenames/directories)";
