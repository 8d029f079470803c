use clap::Parser;

/// This program locates field records in voting sections and summarizes the vote tallies.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The file containing the description of the dataset, in JSON.
    /// For more information about the file format, read the manual of the section_engine crate.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference file containing the expected summary in JSON format. If provided, elsec will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary will be written in JSON format to the given
    /// location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path, GeoJSON) The sections. Setting this option overrides the sections of the --config option.
    #[clap(short, long, value_parser)]
    pub sections: Option<String>,

    /// (file path, CSV) The leaders to locate. Setting this option overrides the records of the --config option.
    #[clap(long, value_parser)]
    pub records: Option<String>,

    /// (file path, CSV or xlsx) The vote tallies. Setting this option overrides the tallies of the --config option.
    #[clap(long, value_parser)]
    pub rows: Option<String>,

    /// (list of comma-separated values or not specified) The parties compared to find the swing sections,
    /// in tiebreak order.
    #[clap(long, value_parser, value_delimiter = ',')]
    pub tracked_parties: Option<Vec<String>>,

    /// (default 15) The margin (in percent) under which a section is considered a swing section.
    #[clap(long, value_parser)]
    pub swing_threshold: Option<f64>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
