//! Installation hints for commonly used tools

/// Static `(command, hint)` table
const HINTS: &[(&str, &str)] = &[
    ("npm", "Install Node.js from https://nodejs.org/ (npm is bundled)."),
    ("npx", "Install Node.js from https://nodejs.org/ (npx is bundled with npm)."),
    ("node", "Install Node.js from https://nodejs.org/ or via a version manager such as nvm."),
    ("yarn", "Run 'npm install -g yarn' or enable it with 'corepack enable'."),
    ("pnpm", "Run 'npm install -g pnpm' or enable it with 'corepack enable'."),
    ("pip", "Install Python from https://www.python.org/ (pip is bundled)."),
    ("pip3", "Install Python 3 from https://www.python.org/ (pip3 is bundled)."),
    ("python", "Install Python from https://www.python.org/."),
    ("python3", "Install Python 3 from https://www.python.org/."),
    ("pipenv", "Run 'pip install --user pipenv'."),
    ("go", "Install Go from https://go.dev/dl/."),
    ("composer", "Install Composer from https://getcomposer.org/download/."),
    ("dotnet", "Install the .NET SDK from https://dotnet.microsoft.com/download."),
    ("nuget", "Install NuGet from https://www.nuget.org/downloads or use 'dotnet'."),
    ("gem", "Install Ruby from https://www.ruby-lang.org/ (gem is bundled)."),
    ("bundle", "Run 'gem install bundler'."),
    ("bundler", "Run 'gem install bundler'."),
    ("cargo", "Install Rust via https://rustup.rs/."),
    ("mvn", "Install Apache Maven from https://maven.apache.org/download.cgi."),
    ("gradle", "Install Gradle from https://gradle.org/install/."),
    ("grep", "Install GNU grep with your system package manager."),
    ("awk", "Install awk (gawk or mawk) with your system package manager."),
    ("sed", "Install GNU sed with your system package manager."),
    ("sort", "Install GNU coreutils with your system package manager."),
    ("curl", "Install curl with your system package manager."),
    ("wget", "Install wget with your system package manager."),
    ("jq", "Install jq from https://jqlang.github.io/jq/download/."),
    ("yq", "Install yq from https://github.com/mikefarah/yq#install."),
];

/// Hint for a known command
pub fn hint_for(command: &str) -> Option<&'static str> {
    HINTS
        .iter()
        .find(|(name, _)| *name == command)
        .map(|(_, hint)| *hint)
}

/// Hint for any command, falling back to generic PATH guidance
pub fn resolution_hint(command: &str) -> String {
    match hint_for(command) {
        Some(hint) => hint.to_string(),
        None => format!(
            "Ensure '{}' is installed and available in your PATH.\n             \
             If using a custom tool, install it or update your config to use an available alternative.",
            command
        ),
    }
}
