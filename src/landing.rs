use actix_web::HttpResponse;

// Landing page with a quick form for each predictor; everything else is the JSON API.
pub async fn serve_homepage() -> HttpResponse {
    let html_content = r#"
    <!DOCTYPE html>
    <html>
    <head>
        <title>EduMind - Student Insight Predictors</title>
        <style>
            body { font-family: Arial, sans-serif; max-width: 900px; margin: 50px auto; padding: 20px; }
            .container { background: #f5f5f5; padding: 25px; border-radius: 10px; }
            .form-group { margin: 12px 0; }
            label { display: block; margin-bottom: 5px; font-weight: bold; }
            input, select { width: 100%; padding: 10px; border: 1px solid #ddd; border-radius: 4px; }
            button { background: #007bff; color: white; padding: 12px 24px; border: none; border-radius: 4px; cursor: pointer; margin: 5px; }
            button:hover { background: #0056b3; }
            .result { margin-top: 20px; padding: 20px; border-radius: 5px; display: none; }
            .safe { background: #d4edda; color: #155724; border: 1px solid #c3e6cb; }
            .risk { background: #f8d7da; color: #721c24; border: 1px solid #f5c6cb; }
            .warning { background: #fff3cd; color: #856404; border: 1px solid #ffeaa7; }
            .info { background: #d1ecf1; color: #0c5460; border: 1px solid #bee5eb; }
            .feature-section { background: #e8f5e8; padding: 20px; border-radius: 10px; margin: 20px 0; }
            .grid { display: grid; grid-template-columns: 1fr 1fr; gap: 12px; }
        </style>
    </head>
    <body>
        <div class="container">
            <h1>🎓 EduMind Student Insight Predictors</h1>
            <p>Academic risk, engagement and learning-style predictions for a single student.</p>

            <div class="feature-section">
                <h3>📊 Academic Risk</h3>
                <div class="grid">
                    <div class="form-group"><label for="risk-id">Student ID</label><input id="risk-id" value="STU0001"></div>
                    <div class="form-group"><label for="avg-grade">Average Grade (%)</label><input type="number" id="avg-grade" value="65"></div>
                    <div class="form-group"><label for="consistency">Grade Consistency (%)</label><input type="number" id="consistency" value="80"></div>
                    <div class="form-group"><label for="assessments">Assessments Taken</label><input type="number" id="assessments" value="8"></div>
                    <div class="form-group"><label for="completion">Completion Rate (0-1)</label><input type="number" step="0.05" id="completion" value="0.85"></div>
                    <div class="form-group"><label for="low-engagement">Low Engagement</label>
                        <select id="low-engagement"><option value="0">No</option><option value="1">Yes</option></select></div>
                </div>
                <button onclick="predictRisk()">📊 Predict Academic Risk</button>
                <div id="risk-result" class="result"></div>
            </div>

            <div class="feature-section">
                <h3>🧠 Learning Style</h3>
                <div class="grid">
                    <div class="form-group"><label for="ls-id">Student ID</label><input id="ls-id" value="STU0001"></div>
                    <div class="form-group"><label for="diagrams">Prefers Diagrams (1-5)</label><input type="number" id="diagrams" value="4"></div>
                    <div class="form-group"><label for="lectures">Prefers Lectures (1-5)</label><input type="number" id="lectures" value="3"></div>
                    <div class="form-group"><label for="reading">Prefers Reading (1-5)</label><input type="number" id="reading" value="3"></div>
                    <div class="form-group"><label for="hands-on">Prefers Hands-on (1-5)</label><input type="number" id="hands-on" value="2"></div>
                </div>
                <button onclick="predictStyle()" style="background: #6f42c1;">🧠 Find Learning Style</button>
                <div id="style-result" class="result"></div>
            </div>

            <div class="feature-section">
                <h3>📈 Engagement</h3>
                <div class="grid">
                    <div class="form-group"><label for="eng-id">Student ID</label><input id="eng-id" value="STU0001"></div>
                    <div class="form-group"><label for="logins">Logins per Week</label><input type="number" id="logins" value="5"></div>
                    <div class="form-group"><label for="completed">Assignments Completed (%)</label><input type="number" id="completed" value="80"></div>
                    <div class="form-group"><label for="quiz">Quiz Scores (%)</label><input type="number" id="quiz" value="70"></div>
                </div>
                <button onclick="predictEngagement()" style="background: #28a745;">📈 Score Engagement</button>
                <div id="engagement-result" class="result"></div>
            </div>
        </div>

        <script>
            async function post(url, body) {
                const response = await fetch(url, {
                    method: 'POST',
                    headers: {'Content-Type': 'application/json'},
                    body: JSON.stringify(body)
                });
                const data = await response.json();
                if (!response.ok) throw new Error(data.field ? `${data.field}: ${data.message}` : data.message);
                return data;
            }

            function show(id, cls, html) {
                const div = document.getElementById(id);
                div.style.display = 'block';
                div.className = 'result ' + cls;
                div.innerHTML = html;
            }

            const value = id => document.getElementById(id).value;
            const number = id => parseFloat(value(id));

            async function predictRisk() {
                try {
                    const grade = number('avg-grade');
                    const data = await post('/api/v1/academic-risk/predict', {
                        student_id: value('risk-id'),
                        avg_grade: grade,
                        grade_consistency: number('consistency'),
                        grade_range: 20,
                        num_assessments: parseInt(value('assessments')),
                        assessment_completion_rate: number('completion'),
                        studied_credits: 60,
                        num_of_prev_attempts: 0,
                        low_performance: grade < 40 ? 1 : 0,
                        low_engagement: parseInt(value('low-engagement')),
                        has_previous_attempts: 0
                    });
                    const plan = await (await fetch('/api/v1/action-plans/' + encodeURIComponent(data.risk_level))).json();
                    const cls = data.risk_level === 'Safe' ? 'safe' : (data.risk_level === 'At-Risk' ? 'risk' : 'warning');
                    show('risk-result', cls, `
                        <h3>${data.risk_level}</h3>
                        <p><strong>Risk Score:</strong> ${(data.risk_score * 100).toFixed(1)}% | <strong>Confidence:</strong> ${data.confidence.toFixed(1)}%</p>
                        <ul>${data.recommendations.map(r => `<li>${r}</li>`).join('')}</ul>
                        <h4>Action Plan</h4>
                        <ul>${plan.items.map(a => `<li><strong>[${a.priority}]</strong> ${a.title}</li>`).join('')}</ul>
                    `);
                } catch (error) {
                    show('risk-result', 'risk', `<p>Error: ${error.message}</p>`);
                }
            }

            async function predictStyle() {
                try {
                    const data = await post('/api/v1/learning-style/predict', {
                        student_id: value('ls-id'),
                        prefers_diagrams: number('diagrams'),
                        prefers_lectures: number('lectures'),
                        prefers_reading: number('reading'),
                        prefers_hands_on: number('hands-on'),
                        note_taking_style: 'mixed',
                        study_environment: 'varies',
                        retention_method: 'seeing',
                        video_watch_time: 30,
                        reading_time: 30,
                        interactive_time: 30
                    });
                    const r = data.result;
                    show('style-result', 'info', `
                        <h3>${r.primary_style} (secondary: ${r.secondary_style})</h3>
                        <p><strong>Confidence:</strong> ${r.confidence}%</p>
                        <ul>${r.recommendations.map(x => `<li>${x}</li>`).join('')}</ul>
                    `);
                } catch (error) {
                    show('style-result', 'risk', `<p>Error: ${error.message}</p>`);
                }
            }

            async function predictEngagement() {
                try {
                    const data = await post('/api/v1/engagement/predict', {
                        student_id: value('eng-id'),
                        login_frequency: number('logins'),
                        session_duration: 30,
                        page_views: 10,
                        assignments_completed: number('completed'),
                        assignments_on_time: 75,
                        quiz_attempts: 1,
                        quiz_scores: number('quiz'),
                        forum_posts: 2,
                        forum_replies: 3,
                        group_participation: 3,
                        video_completion_rate: 70,
                        resource_downloads: 3,
                        time_on_task: 120
                    });
                    const r = data.result.result;
                    show('engagement-result', r.engagement_score >= 60 ? 'safe' : 'warning', `
                        <h3>${r.engagement_level.replace('_', ' ')}: ${r.engagement_score}/100</h3>
                        <p><strong>Trend:</strong> ${r.trend}</p>
                        <ul>${r.recommendations.map(x => `<li>${x}</li>`).join('')}</ul>
                    `);
                } catch (error) {
                    show('engagement-result', 'risk', `<p>Error: ${error.message}</p>`);
                }
            }
        </script>
    </body>
    </html>
    "#;

    HttpResponse::Ok().content_type("text/html").body(html_content)
}
