use crate::core::collection::Partition;

const ONGOING_HEADER: &str = "===== ONGOING =====";
const TODAY_HEADER: &str = "===== TODAY =====";

pub fn render(partition: &Partition) -> String {
    let mut out = String::new();

    section(&mut out, ONGOING_HEADER, partition.ongoing.iter().map(|e| e.display_line()));
    out.push('\n');
    section(&mut out, TODAY_HEADER, partition.today.iter().map(|e| e.display_line()));

    out
}

fn section<'a>(out: &mut String, header: &str, lines: impl Iterator<Item = &'a str>) {
    out.push_str(header);
    out.push('\n');
    for line in lines {
        out.push_str(line);
    }
}
