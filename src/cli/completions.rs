use clap::Parser;

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    pacs-tools completions --shell bash > ~/.bash_completion.d/pacs-tools\n\n\
                  Generate zsh completions:\n    pacs-tools completions --shell zsh > ~/.zfunc/_pacs-tools\n\n\
                  Generate fish completions:\n    pacs-tools completions --shell fish > ~/.config/fish/completions/pacs-tools.fish")]
pub struct CompletionsArgs {
    /// Shell type (bash, elvish, fish, powershell, zsh)
    #[arg(long, value_name = "NAME")]
    pub shell: String,
}
