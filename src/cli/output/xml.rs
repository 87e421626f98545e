use crate::config::Settings;
use crate::errors::ErrorMessage;

pub fn render(diagnostics: &[ErrorMessage], settings: &Settings) {
    let version = settings.xml_version;
    println!("{}", ErrorMessage::xml_header(version));
    for d in diagnostics {
        println!("{}", d.to_xml(settings.verbose, version));
    }
    println!("{}", ErrorMessage::xml_footer(version));
}
