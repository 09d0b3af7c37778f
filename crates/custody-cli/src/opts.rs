use gumdrop::Options;

#[derive(Debug, Options, Clone)]
pub struct CustodyOpts {
    help: bool,

    #[options(help = "directory holding the custodian and secret records", default = "data")]
    pub data_dir: String,

    #[options(help = "path to a JSON config file (defaults are used if none provided)")]
    pub config: Option<String>,

    #[options(command)]
    pub command: Option<Command>,
}

// The supported commands
#[derive(Debug, Options, Clone)]
pub enum Command {
    #[options(help = "register a user as a custodian")]
    Register(RegisterOpts),

    #[options(help = "split a secret and distribute its shares to custodians")]
    Submit(SubmitOpts),

    #[options(help = "answer the submission questions one by one on stdin")]
    Interactive(InteractiveOpts),

    #[options(help = "list the secrets of an owner")]
    List(OwnerOpts),

    #[options(help = "collect the shares of a secret and reconstruct it")]
    Retrieve(RetrieveOpts),

    #[options(help = "show which custodians hold the shares of a secret")]
    Holders(SecretOpts),

    #[options(help = "show the share count and threshold a submission would use")]
    Recommend(OwnerOpts),

    #[options(help = "register dummy custodians, for testing")]
    GenerateDummy(GenerateDummyOpts),

    #[options(help = "remove every dummy custodian and the shares they hold")]
    ClearDummy(ClearDummyOpts),
}

#[derive(Debug, Options, Clone)]
pub struct RegisterOpts {
    help: bool,

    #[options(required, help = "the user id of the custodian")]
    pub id: u64,

    #[options(help = "the custodian's username")]
    pub username: Option<String>,
}

#[derive(Debug, Options, Clone)]
pub struct SubmitOpts {
    help: bool,

    #[options(required, help = "the user id of the owner")]
    pub owner: u64,

    #[options(help = "the owner's username")]
    pub owner_name: Option<String>,

    #[options(help = "the secret (read from stdin if none provided)")]
    pub secret: Option<String>,

    #[options(help = "number of shares to create (recommended value if none provided)")]
    pub shares: Option<usize>,

    #[options(help = "number of shares needed to reconstruct (recommended value if none provided)")]
    pub threshold: Option<usize>,
}

#[derive(Debug, Options, Clone)]
pub struct InteractiveOpts {
    help: bool,

    #[options(required, help = "the user id of the owner")]
    pub owner: u64,

    #[options(help = "the owner's username")]
    pub owner_name: Option<String>,
}

#[derive(Debug, Options, Clone)]
pub struct OwnerOpts {
    help: bool,

    #[options(required, help = "the user id of the owner")]
    pub owner: u64,
}

#[derive(Debug, Options, Clone)]
pub struct SecretOpts {
    help: bool,

    #[options(required, help = "the user id of the owner")]
    pub owner: u64,

    #[options(required, help = "the id of the secret")]
    pub secret_id: String,
}

#[derive(Debug, Options, Clone)]
pub struct RetrieveOpts {
    help: bool,

    #[options(required, help = "the user id of the owner")]
    pub owner: u64,

    #[options(required, help = "the id of the secret")]
    pub secret_id: String,

    #[options(help = "path to the file where the secret will be written (stdout if none provided)")]
    pub output: Option<String>,
}

#[derive(Debug, Options, Clone)]
pub struct GenerateDummyOpts {
    help: bool,

    #[options(help = "how many dummy custodians to register, 1 to 1000", default = "10")]
    pub count: usize,
}

#[derive(Debug, Options, Clone)]
pub struct ClearDummyOpts {
    help: bool,

    #[options(help = "do not ask for confirmation")]
    pub yes: bool,
}
