/*!

This is the long-form manual for `survey_form` and `vslsurvey`.

## Filling in a questionnaire

A questionnaire is an ordered list of sections, each holding questions. The state of
one respondent is a [crate::FormState]: the section currently displayed and the
answers given so far.

- Respondents move freely between sections (`go_next`, `go_previous`, `jump_to`).
  Nothing forces a section to be complete before moving on, and partial submissions
  are accepted.
- A question may depend on a previous answer (`only_if` in the builder). It is only
  displayed and recorded while the condition holds. When an answer changes so that a
  condition no longer holds, the answers of the dependent questions are withdrawn:
  switching back later does not resurrect them.

## The dataset

Every submission becomes one row of a CSV file. The columns are the union of all the
question keys ever recorded, so the file keeps working when the questionnaire changes
from one release to the next:

```text
response_id,region,experience,submitted_at,vsl_types
3f9c0a5d2e7b41c8,Europe,8+ years,2025-03-10T12:23:30Z,
81b2e4f0c6d9a753,Asia,,2025-03-11T08:01:12Z,"Weather-responsive, Other"
```

- `response_id` is always the first column. It identifies a submission.
- Multiple choices are joined with `, `.
- Columns that a row did not answer are left empty.

## Committing a response

The dataset is shared by all the respondents, and lives in a store that supports
versioned writes (a file in a git hosting service, a local file). The
[crate::DurableAppender] commits a record as follows:

1. read the current content and its version;
2. append the row and write the content back, on the condition that the version did
   not change in the meantime;
3. if another respondent committed first, start again from 1.

The dataset is only created when the store states that it does not exist. A failed
read is retried, never treated as an absent dataset. Since the response id travels with
the row, a write that went through without being acknowledged is recognised on the next
read and not duplicated.

After the last attempt, the appender reports either a conflict (the dataset kept
changing) or an unavailable store. In both cases the record is still available to the
caller; `vslsurvey` always writes a local copy of the response before committing it.

## Configuration of `vslsurvey`

`vslsurvey` reads an optional JSON configuration file (`--config`). All the keys are
optional.

```json
{
  "outputSettings": { "exportPath": "vsl_responses.csv" },
  "storage": {
    "provider": "github",
    "repository": "abdhulkhadhir/qd_visualiser",
    "filePath": "responses.csv",
    "tokenEnv": "GITHUB_TOKEN"
  },
  "retry": { "maxAttempts": 5, "backoffMillis": 200 }
}
```

Providers:
 - `github` (default): the file `filePath` in the repository `repository`, through the
   contents API. The access token is read from the environment variable named by
   `tokenEnv`. `branch`, `apiUrl`, `createMessage` and `updateMessage` are also
   accepted.
 - `file`: a local CSV file at `filePath`. The option `--dataset` selects this provider
   directly.
 - `none`: responses are only written to the local export.

The local export is written before the commit, on a best-effort basis: if it cannot be
written, a warning is logged and the response is still committed. It is never written
over the dataset of the `file` provider, whatever the spelling of the path. With
`--dry-run`, neither the export nor the dataset is written.

*/
