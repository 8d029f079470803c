/*!

This is the long-form manual for `section_engine` and `elsec`.

## What it computes

Given a set of voting sections (each with a boundary polygon), a set of located
records (leaders, field log entries) and the vote tallies of each section, `elsec`:

1. fills in the section of every record that has a coordinate but no section,
 using a point-in-polygon test against the section boundaries;
2. sums the joint-ticket columns of each declared alliance, per section and per district;
3. ranks the tracked parties of each section and flags the *swing sections*, whose
 margin between the first two parties is below a threshold (15% by default).

Nothing is written back to the sources: the program produces the list of updates
and a summary, and the caller applies them.

## Input formats

The following formats are supported:
* `geojson` for the sections
* `csv`, `xlsx` for the vote tallies
* `csv` for the leaders and log entries

### `geojson`

A `FeatureCollection` in which every feature is a section. The geometry must be a
`Polygon` or a `MultiPolygon` with `[longitude, latitude]` positions. Rings that are not
closed are closed when reading. Features with another type of geometry (or none) are
kept but can never be matched.

The properties carry the identifiers and, optionally, the vote counts:

```text
{ "id": 1204, "district": 7, "municipality": "Centro", "PAN": 120, "MORENA": 98, "TOTAL_VOTES": 301 }
```

Every numeric property other than the identifiers is read as a vote column.

### `csv` (vote tallies)

One row per section, with a header row. The name of the columns is significant.

```text
section,district,PAN,PRI,MORENA,PAN_PRI,PAN_PRI_PRD,total
1204,7,120,35,98,12,4,301
1205,7,88,40,,6,1,250
```

A blank count is read as 0. The `district` column is optional: when it is missing,
the district of the section is used.

### `xlsx` (vote tallies)

The same layout as the `csv` format, in an Excel worksheet. If the workbook has
more than one worksheet, its name must be given with `excelWorksheetName`.

### `csv` (records)

```text
id,longitude,latitude,section
L-001,-99.1332,19.4326,
L-002,-99.1410,19.4270,1205
```

Records with a section are left untouched. Records without coordinates are counted
but not resolved.

## Configuration

The program accepts a configuration file in JSON:

```text
{
  "outputSettings": { "datasetName": "cdmx-2024", "outputDirectory": "out" },
  "sectionSources": [ { "provider": "geojson", "filePath": "sections.geojson" } ],
  "electoralSources": [ { "provider": "csv", "filePath": "results.csv" } ],
  "recordSources": [
    { "provider": "csv", "kind": "leader", "filePath": "leaders.csv" },
    { "provider": "csv", "kind": "log", "filePath": "field_log.csv" }
  ],
  "rules": {
    "alliances": [ { "name": "pan_alliance", "columns": ["PAN_PRI", "PAN_PRI_PRD"] } ],
    "trackedParties": ["PAN", "PRI", "MORENA"],
    "swingThreshold": 15.0
  }
}
```

Paths are relative to the directory of the configuration file.

Options for `sectionSources`:
 - `idProperty`, `districtProperty`, `municipalityProperty` (string, optional): the
   names of the feature properties. Default to `id`, `district` and `municipality`.

Options for `electoralSources`:
 - `sectionColumn` (default `section`), `districtColumn` (optional),
   `totalVotesColumn` (default `total`)
 - `excelWorksheetName` (string, optional)

Options for `recordSources`:
 - `kind`: `leader` or `log`
 - `idColumn` (default `id`), `longitudeColumn` (default `longitude`),
   `latitudeColumn` (default `latitude`), `sectionColumn` (default `section`)

Options for `rules`:
 - `alliances`: the joint-ticket columns of each alliance. The columns of two
   alliances should not overlap, they would be counted twice.
 - `trackedParties`: the solo columns compared for competitiveness. When two parties
   have the same number of votes, the first one in this list is ranked first.
 - `swingThreshold` (number, default 15.0): a section is a swing section when its
   margin is strictly lower than this percentage.
 - `totalVotesProperty` (default `TOTAL_VOTES`): used when the vote tallies are read
   from the section properties (no `electoralSources`).
 - `batchSize` (default 500), `parallelism` (default 0: one worker per core).

## Known limitations

- Holes in polygons are ignored: a point inside a hole is inside the section.
- A point exactly on the boundary of a section may be attributed to either side.
- If two sections overlap, the one listed first in the input wins.
- There is no spatial index: every record is tested against the sections in order.

 */
