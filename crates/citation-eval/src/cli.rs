use thiserror::Error;

#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub update_goldens: bool,
    pub case_filter: Option<String>,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
    #[error("missing value for argument: {0}")]
    MissingValue(String),
    #[error("help requested")]
    HelpRequested,
}

impl CliOptions {
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Self::default();

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => return Err(CliError::HelpRequested),
                "--update-goldens" => options.update_goldens = true,
                "--case" => {
                    let value = iter.next().ok_or(CliError::MissingValue(arg.clone()))?;
                    options.case_filter = Some(value.trim().to_string());
                }
                unknown => return Err(CliError::UnknownArgument(unknown.to_string())),
            }
        }

        Ok(options)
    }

    pub fn selects(&self, case_id: &str) -> bool {
        self.case_filter
            .as_deref()
            .is_none_or(|filter| filter == case_id)
    }
}
