//! System prompt construction

use std::fmt::Write;

/// A searchable codebase made available to the agent
#[derive(Debug, Clone)]
pub struct ResourceInfo {
    /// Name, also the top-level directory under the working dir
    pub name: String,
    /// Optional free-form notes shown to the model
    pub notes: Option<String>,
}

impl ResourceInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            notes: None,
        }
    }
}

/// Build the system prompt from the available resources
pub fn system_prompt(resources: &[ResourceInfo]) -> String {
    let mut prompt = String::from("You answer coding questions by searching these repositories:\n\n");

    for resource in resources {
        let _ = writeln!(prompt, "## {}", resource.name);
        let _ = writeln!(prompt, "Directory: ./{}", resource.name);
        if let Some(notes) = &resource.notes {
            let _ = writeln!(prompt, "Notes: {}", notes);
        }
        prompt.push('\n');
    }

    prompt.push_str(
        r#"## Available Tools

You have EXACTLY these 4 tools available - use ONLY these tools:

1. **grep** - Search file contents using regex patterns
2. **glob** - Find files matching a glob pattern (e.g., "*.go", "**/*.md")
3. **read** - Read contents of a specific file
4. **list** - List directory contents

DO NOT try to use any other tools (like "search" or "find"). They do not exist.

## How to Answer

1. SEARCH FIRST using grep or glob before answering.
2. After finding relevant code (1-3 searches), STOP SEARCHING and write your answer.
3. Use grep to find code containing specific patterns.
4. Use glob to locate files by name.
5. Use read to examine specific files you found.
6. Quote code directly from results with file paths.
7. IMPORTANT: Once you have enough information to answer, respond immediately - do not keep searching.
8. Say "not found in repos" if you can't find relevant code after 2-3 searches.

## When to Stop Searching

- After 2-3 successful searches that return relevant code, WRITE YOUR ANSWER
- Do not search for every possible variation - synthesize from what you found
- If a search returns useful results, use them in your answer rather than searching more

## Response Format

- Use Markdown format
- Include code blocks with the source file path
- Keep explanations brief and focused
- Answer based on actual code, not assumptions

## Search Tips

- Search for function/class/variable names exactly
- Try multiple search terms if the first search fails
- Check imports to find related code
- Look at test files for usage examples
"#,
    );

    prompt
}

/// Appended to the system prompt once the loop detects the model is stuck
pub fn stuck_loop_hint() -> &'static str {
    r#"

## IMPORTANT: Search Guidance

Your previous searches have not returned useful results. Please:

1. Try DIFFERENT search patterns - avoid repeating the same searches
2. Use simpler, more general patterns (e.g., just the function name, not the full signature)
3. Try searching in different directories or with different file extensions
4. If you've tried 2-3 different patterns without success, provide your best answer based on general knowledge and explain that specific code examples were not found in the repository
5. Do NOT repeat searches that returned "No files found"

If you cannot find relevant code, it's better to give a helpful general answer than to keep searching indefinitely.
"#
}
