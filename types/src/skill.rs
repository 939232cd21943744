/// A user-defined slash command backed by a prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub prompt: String,
}

impl Skill {
    /// Prompt to send, with `args` appended when present.
    #[must_use]
    pub fn render(&self, args: &str) -> String {
        let args = args.trim();
        if args.is_empty() {
            self.prompt.clone()
        } else if self.prompt.contains("$ARGUMENTS") {
            self.prompt.replace("$ARGUMENTS", args)
        } else {
            format!("{}\n\n{args}", self.prompt.trim_end())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Skill;

    fn skill(prompt: &str) -> Skill {
        Skill {
            name: "fix".into(),
            description: "Fix an issue".into(),
            prompt: prompt.into(),
        }
    }

    #[test]
    fn render_without_args_is_prompt() {
        assert_eq!(skill("Fix it.").render("  "), "Fix it.");
    }

    #[test]
    fn render_substitutes_placeholder() {
        assert_eq!(skill("Fix issue $ARGUMENTS now").render("#12"), "Fix issue #12 now");
    }

    #[test]
    fn render_appends_args() {
        assert_eq!(skill("Fix it.\n").render("quickly"), "Fix it.\n\nquickly");
    }
}
